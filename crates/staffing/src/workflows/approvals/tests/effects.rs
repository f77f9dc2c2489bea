use std::sync::Arc;

use chrono::Utc;

use super::common::*;
use crate::access::domain::{ProjectId, UserId};
use crate::memory::InMemoryStore;
use crate::repository::LedgerStore;
use crate::workflows::approvals::domain::{LeaveType, RequestId};
use crate::workflows::approvals::effects::{EffectDispatcher, EffectOutcome, LeavePolicy, SideEffect};
use crate::workflows::approvals::errors::DispatchError;
use crate::workflows::approvals::ledger::{LeaveBalance, ProofId, ProofStatus};

fn dispatcher() -> (EffectDispatcher<InMemoryStore>, Arc<InMemoryStore>) {
    let store = Arc::new(seeded_store());
    (
        EffectDispatcher::new(Arc::clone(&store), LeavePolicy::default()),
        store,
    )
}

fn allocation_effect(request: &str, percentage: u8) -> SideEffect {
    SideEffect::CreateAllocation {
        request: RequestId(request.to_string()),
        user: UserId::new("u-emp"),
        project: ProjectId::new("p-orion"),
        percentage,
        role: "Engineer".to_string(),
        start_date: date(2030, 3, 4),
        end_date: None,
    }
}

fn debit(request: &str, days: u32) -> SideEffect {
    SideEffect::DebitLeave {
        request: RequestId(request.to_string()),
        user: UserId::new("u-emp"),
        year: 2030,
        leave_type: LeaveType::Annual,
        days,
    }
}

#[test]
fn allocation_is_created_once_per_user_and_project() {
    let (dispatcher, store) = dispatcher();
    let now = Utc::now();

    let first = dispatcher
        .apply(&allocation_effect("req-a", 60), now)
        .expect("first allocation");
    let EffectOutcome::AllocationCreated { allocation } = first else {
        panic!("expected a new allocation, got {first:?}");
    };

    let second = dispatcher
        .apply(&allocation_effect("req-b", 40), now)
        .expect("second attempt is not an error");
    assert_eq!(
        second,
        EffectOutcome::AllocationSkipped {
            existing: allocation.clone()
        }
    );

    let allocations = store
        .allocations_for(&UserId::new("u-emp"))
        .expect("allocations");
    assert_eq!(allocations.len(), 1);
    assert_eq!(allocations[0].id, allocation);
    assert_eq!(allocations[0].percentage, 60);
    assert_eq!(
        allocations[0].source_request,
        Some(RequestId("req-a".to_string()))
    );
}

#[test]
fn leave_debit_is_applied_once_per_request() {
    let (dispatcher, store) = dispatcher();
    let now = Utc::now();

    let first = dispatcher.apply(&debit("req-leave", 5), now).expect("debit");
    assert_eq!(
        first,
        EffectOutcome::LeaveDebited {
            days: 5,
            remaining: 16
        }
    );
    let again = dispatcher.apply(&debit("req-leave", 5), now).expect("replay");
    assert_eq!(again, EffectOutcome::AlreadyApplied);

    let balance = store
        .leave_balance(&UserId::new("u-emp"), 2030)
        .expect("balance lookup")
        .expect("balance persisted");
    assert_eq!(balance.used, 5);
    assert_eq!(balance.remaining(), 16);
}

#[test]
fn insufficient_balance_leaves_the_ledger_untouched() {
    let (dispatcher, store) = dispatcher();
    let mut balance = LeaveBalance::opening(UserId::new("u-emp"), 2030, 21);
    balance.used = 18;
    store
        .patch_leave_balance(balance.clone())
        .expect("seed balance");

    let error = dispatcher
        .apply(&debit("req-long", 5), Utc::now())
        .expect_err("only three days left");

    assert_eq!(
        error,
        DispatchError::InsufficientBalance {
            requested: 5,
            available: 3
        }
    );
    let stored = store
        .leave_balance(&UserId::new("u-emp"), 2030)
        .expect("balance lookup")
        .expect("balance persisted");
    assert_eq!(stored, balance);
}

#[test]
fn compensatory_leave_draws_from_credited_days() {
    let (dispatcher, store) = dispatcher();
    let now = Utc::now();
    dispatcher
        .apply(
            &SideEffect::CreditCompensatory {
                request: RequestId("req-ot".to_string()),
                user: UserId::new("u-emp"),
                year: 2030,
                days: 2,
            },
            now,
        )
        .expect("credit");

    let over = SideEffect::DebitLeave {
        request: RequestId("req-comp-3".to_string()),
        user: UserId::new("u-emp"),
        year: 2030,
        leave_type: LeaveType::Compensatory,
        days: 3,
    };
    assert!(matches!(
        dispatcher.apply(&over, now),
        Err(DispatchError::InsufficientBalance { available: 2, .. })
    ));

    let within = SideEffect::DebitLeave {
        request: RequestId("req-comp-2".to_string()),
        user: UserId::new("u-emp"),
        year: 2030,
        leave_type: LeaveType::Compensatory,
        days: 2,
    };
    dispatcher.apply(&within, now).expect("debit compensatory");

    let balance = store
        .leave_balance(&UserId::new("u-emp"), 2030)
        .expect("balance lookup")
        .expect("balance persisted");
    assert_eq!(balance.compensatory_available(), 0);
    assert_eq!(balance.used, 0);
}

#[test]
fn proof_marking_records_reviewer_and_is_idempotent() {
    let (dispatcher, store) = dispatcher();
    let effect = SideEffect::MarkProof {
        request: RequestId("req-skill".to_string()),
        proof: ProofId("proof-emp-rust".to_string()),
        status: ProofStatus::Verified,
        reviewer: UserId::new("u-lm"),
        note: None,
    };

    assert_eq!(
        dispatcher.apply(&effect, Utc::now()).expect("mark"),
        EffectOutcome::ProofMarked {
            status: ProofStatus::Verified
        }
    );
    assert_eq!(
        dispatcher.apply(&effect, Utc::now()).expect("replay"),
        EffectOutcome::AlreadyApplied
    );

    let proof = store
        .proof(&ProofId("proof-emp-rust".to_string()))
        .expect("proof lookup")
        .expect("proof stored");
    assert_eq!(proof.status, ProofStatus::Verified);
    assert_eq!(proof.reviewed_by, Some(UserId::new("u-lm")));
}

#[test]
fn unknown_balance_reads_as_opening_entitlement() {
    let (dispatcher, store) = dispatcher();
    let balance = dispatcher
        .balance(&UserId::new("u-peer"), 2031)
        .expect("balance");
    assert_eq!(balance.entitlement, policy().annual_leave_days);
    assert_eq!(balance.used, 0);
    assert!(store
        .leave_balance(&UserId::new("u-peer"), 2031)
        .expect("lookup")
        .is_none());
}
