mod common;
mod effects;
mod routing;
