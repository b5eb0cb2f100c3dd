//! Install / upgrade / remove / purge.
//!
//! - `plan`: actions, installed state and precondition rules
//! - `driver`: executes a planned action through a platform handler
//! - `scaffold`: default config generation

mod driver;
mod plan;
mod scaffold;

pub use driver::{select_handler, LifecycleDriver, LifecycleOutcome, LifecycleStage, StageCallback};
pub use plan::{
    check_confirmation, check_installed_state, plan, InstalledState, LifecycleAction, LifecycleOptions, PlannedAction,
};
pub use scaffold::{
    local_ip, log_credentials, render_template, scaffold_config, ServerCredentials, ALTER_ID,
    PORT_RANGE, TEMPLATE_ID, TEMPLATE_PATH, TEMPLATE_PORT,
};
