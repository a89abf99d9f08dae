use anyhow::Result;
use clap::CommandFactory;
use clap_complete::generate;

use virtstage::cli::{self, Commands};
use virtstage::executor::RealCommandExecutor;

fn main() -> Result<()> {
    let args = cli::parse_args()?;

    virtstage::init_logging(args.log_level())?;

    match &args.command {
        Commands::Stage(opts) => {
            let executor = RealCommandExecutor {
                dry_run: opts.dry_run,
            };
            virtstage::run_stage(opts, &executor)
        }
        Commands::Plan(opts) => virtstage::run_plan(opts),
        Commands::Validate(opts) => virtstage::run_validate(opts),
        Commands::Completions(opts) => {
            let mut cmd = cli::Cli::command();
            generate(opts.shell, &mut cmd, env!("CARGO_PKG_NAME"), &mut std::io::stdout());
            Ok(())
        }
    }
}
