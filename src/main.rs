use std::sync::Arc;

use careermate_session::config::{load_config, print_schema};
use careermate_session::startup::run;
use careermate_session::utils::logger::init_logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::args().skip(1).any(|arg| arg == "--schema") {
        print_schema()?;
        return Ok(());
    }

    let config = Arc::new(load_config());
    init_logging(&config.logging)?;
    run(config).await
}
