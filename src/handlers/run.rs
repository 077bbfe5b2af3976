use anyhow::Result;
use log::debug;
use crate::cli::Cli;
use crate::config::TreeshConfig;
use crate::handlers::input::{LineList, LineSource, ScriptSource, StdinSource};
use crate::handlers::session::{Session, install_interrupt_handler};

/// Picks the line source from the command line and runs the session over it.
pub fn handle_run(cli: &Cli, config: &TreeshConfig) -> Result<i32> {
    let mut session = Session::new(config, cli.dry_run);

    if let Some(line) = &cli.command {
        debug!("running single command line");
        return session.run(&mut LineList::new([line.as_str()]));
    }

    if let Some(path) = &cli.script {
        debug!("running script {}", path.display());
        return session.run(&mut ScriptSource::open(path)?);
    }

    let mut source = StdinSource::new();
    if source.is_interactive() {
        install_interrupt_handler()?;
    }
    session.run(&mut source)
}
