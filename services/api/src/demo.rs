use crate::infra::SeedDirectory;
use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};
use clap::Args;
use staffing::access::{Actor, ProjectId, UserId};
use staffing::api::StaffingApi;
use staffing::config::PolicyConfig;
use staffing::error::AppError;
use staffing::memory::InMemoryStore;
use staffing::workflows::approvals::{
    ApprovalError, ApprovalRequest, CompensationType, DecisionAction, DecisionInput, DecisionOutcome,
    EffectOutcome, LeaveRequestInput, LeaveType, OvertimeRequestInput, ResourceRequestInput,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// First day of the demo leave week (YYYY-MM-DD). Defaults to next Monday.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) leave_start: Option<NaiveDate>,
    /// Print every request as JSON after its final decision.
    #[arg(long)]
    pub(crate) json: bool,
}

type DemoApi = StaffingApi<InMemoryStore>;

struct Cast {
    hr: Actor,
    pm: Actor,
    line_manager: Actor,
    employee: Actor,
    colleague: Actor,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { leave_start, json } = args;
    let leave_start = leave_start.unwrap_or_else(|| next_monday(Local::now().date_naive()));

    let store = Arc::new(InMemoryStore::new());
    SeedDirectory::sample().load_into(&store);
    let api = StaffingApi::new(Arc::clone(&store), PolicyConfig::default());

    let cast = Cast {
        hr: api.resolver.resolve_id(&UserId::new("hugo"))?,
        pm: api.resolver.resolve_id(&UserId::new("petra"))?,
        line_manager: api.resolver.resolve_id(&UserId::new("lars"))?,
        employee: api.resolver.resolve_id(&UserId::new("emma"))?,
        colleague: api.resolver.resolve_id(&UserId::new("noah"))?,
    };

    println!("Staffing approval demo (leave week starting {leave_start})");

    println!("\n1. Resource request walked through every stage");
    let staffed = api
        .approvals
        .submit_resource_request(&cast.pm, resource(&cast.employee, "atlas", leave_start))?;
    print_submitted(&staffed);
    print_outcome(&decide(&api, &staffed, &cast.line_manager, DecisionAction::Approve)?);
    let outcome = decide(&api, &staffed, &cast.hr, DecisionAction::Approve)?;
    print_outcome(&outcome);
    render_json(&api, &staffed, &cast.hr, json)?;

    println!("\n2. HR approval from the first stage");
    let bypassed = api
        .approvals
        .submit_resource_request(&cast.pm, resource(&cast.colleague, "beacon", leave_start))?;
    print_submitted(&bypassed);
    print_outcome(&decide(&api, &bypassed, &cast.hr, DecisionAction::Approve)?);

    println!("\n3. Decisions on a finished request");
    match decide(&api, &staffed, &cast.line_manager, DecisionAction::Approve) {
        Ok(outcome) => print_outcome(&outcome),
        Err(err) => println!("  Refused ({}): {err}", err.kind()),
    }

    println!("\n4. Duplicate staffing request");
    match api
        .approvals
        .submit_resource_request(&cast.pm, resource(&cast.employee, "atlas", leave_start))
    {
        Ok(request) => print_submitted(&request),
        Err(err) => println!("  Refused ({}): {err}", err.kind()),
    }

    println!("\n5. Employees cannot approve");
    let leave = api.approvals.submit_leave_request(
        &cast.employee,
        leave_week(leave_start, leave_start, &cast.colleague),
    )?;
    print_submitted(&leave);
    match decide(&api, &leave, &cast.colleague, DecisionAction::Approve) {
        Ok(outcome) => print_outcome(&outcome),
        Err(err) => println!("  Refused ({}): {err}", err.kind()),
    }

    println!("\n6. Cancelling a pending request");
    let cancelled = api.approvals.cancel(
        &leave.id,
        &cast.employee,
        Some("plans changed".to_string()),
    )?;
    println!("- {} -> {}", cancelled.id, cancelled.status);

    println!("\n7. Leave beyond the remaining balance");
    let year = leave_start.year();
    let balance = api
        .approvals
        .set_leave_entitlement(&cast.hr, &cast.employee.user_id, year, 2)?;
    println!("- Entitlement for {year} set to {} days", balance.entitlement);
    let leave_end = leave_start + Duration::days(4);
    match api.approvals.submit_leave_request(
        &cast.employee,
        leave_week(leave_start, leave_end, &cast.colleague),
    ) {
        Ok(request) => print_submitted(&request),
        Err(err) => println!("  Refused ({}): {err}", err.kind()),
    }

    println!("\n8. Overtime converted to compensatory leave");
    let overtime = api.approvals.submit_overtime_request(
        &cast.employee,
        OvertimeRequestInput {
            subject: None,
            project: ProjectId::new("atlas"),
            date: leave_start,
            hours: 9.5,
            compensation: CompensationType::TimeOff,
            reason: "Atlas cut-over weekend".to_string(),
        },
    )?;
    print_submitted(&overtime);
    for approver in [&cast.line_manager, &cast.pm, &cast.hr] {
        print_outcome(&decide(&api, &overtime, approver, DecisionAction::Approve)?);
    }
    let balance = api
        .approvals
        .leave_balance(&cast.hr, &cast.employee.user_id, year)?;
    println!(
        "- Compensatory days available for {}: {}",
        cast.employee.user_id,
        balance.compensatory_available()
    );

    println!("\nNotifications for {}", cast.employee.user_id);
    for notification in api.inbox.list(&cast.employee, false)? {
        println!(
            "  - [{:?}/{:?}] {}",
            notification.category, notification.priority, notification.message
        );
    }
    println!(
        "Role changes recorded: {} | notifications stored: {}",
        store.role_changes().len(),
        store.all_notifications().len()
    );

    Ok(())
}

fn next_monday(today: NaiveDate) -> NaiveDate {
    let mut day = today + Duration::days(1);
    while day.weekday() != Weekday::Mon {
        day += Duration::days(1);
    }
    day
}

fn resource(subject: &Actor, project: &str, start: NaiveDate) -> ResourceRequestInput {
    ResourceRequestInput {
        subject: subject.user_id.clone(),
        project: ProjectId::new(project),
        percentage: 50,
        role: "Backend engineer".to_string(),
        start_date: start,
        end_date: Some(start + Duration::days(90)),
    }
}

fn leave_week(start: NaiveDate, end: NaiveDate, covering: &Actor) -> LeaveRequestInput {
    LeaveRequestInput {
        subject: None,
        leave_type: LeaveType::Annual,
        start_date: start,
        end_date: end,
        reason: "Family visit".to_string(),
        covering_user: Some(covering.user_id.clone()),
    }
}

fn decide(
    api: &DemoApi,
    request: &ApprovalRequest,
    approver: &Actor,
    action: DecisionAction,
) -> Result<DecisionOutcome, ApprovalError> {
    api.approvals.decide(
        &request.id,
        approver,
        DecisionInput {
            action,
            reason: None,
            expected_stage: None,
        },
    )
}

fn print_submitted(request: &ApprovalRequest) {
    println!(
        "- Submitted {} {} for {} -> {}",
        request.kind().label(),
        request.id,
        request.subject,
        request.status
    );
}

fn print_outcome(outcome: &DecisionOutcome) {
    let stages = outcome
        .decided
        .iter()
        .map(|stage| stage.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    println!(
        "  Decided [{stages}] -> {}{}",
        outcome.status,
        if outcome.bypassed_stage {
            " (stages bypassed)"
        } else {
            ""
        }
    );
    for effect in &outcome.effects {
        let line = match effect {
            EffectOutcome::AllocationCreated { allocation } => {
                format!("allocation {allocation} created")
            }
            EffectOutcome::AllocationSkipped { existing } => {
                format!("allocation {existing} already covers the assignment")
            }
            EffectOutcome::LeaveDebited { days, remaining } => {
                format!("{days} leave days debited, {remaining} remaining")
            }
            EffectOutcome::CompensatoryCredited { days } => {
                format!("{days} compensatory days credited")
            }
            EffectOutcome::ProofMarked { status } => format!("proof marked {status:?}"),
            EffectOutcome::AlreadyApplied => "effect already applied".to_string(),
        };
        println!("    {line}");
    }
}

fn render_json(
    api: &DemoApi,
    request: &ApprovalRequest,
    viewer: &Actor,
    enabled: bool,
) -> Result<(), AppError> {
    if !enabled {
        return Ok(());
    }
    let stored = api.approvals.get(&request.id, viewer)?;
    match serde_json::to_string_pretty(&stored) {
        Ok(body) => println!("{body}"),
        Err(err) => println!("  Unable to render request {}: {err}", request.id),
    }
    Ok(())
}
