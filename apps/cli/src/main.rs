//! `structr-expr`: evaluate expressions and render templates from the shell
//!
//! Entities come from an in-memory store seeded by a JSON fixture, so
//! templates can be tried out without a running Structr instance.

mod cli;

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use structr_expression::services::{
    EntityStore, MemoryLocalizer, MemorySecurity, MemoryStore, ShellProcessRunner, StaticConfig,
};
use structr_expression::{
    ActionContext, EngineConfig, EntityRef, ExpressionEngine, Services, Value,
};
use structr_log::{debug, info};

use cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = structr_log::Config::default()
        .with_level(cli.log_level.clone())
        .with_format(cli.log_format.into());
    let _log = structr_log::init_with(log_config).context("failed to initialize logging")?;

    let session = Session::open(&cli)?;
    let mut out = io::stdout().lock();

    match &cli.command {
        Command::Eval { expression, script } => {
            let (value, printed) = session.eval(expression, *script)?;
            write!(out, "{printed}")?;
            writeln!(out, "{}", value.render())?;
        }
        Command::Render { template } => {
            let source = read_template(template)?;
            let text = session.render(&source)?;
            write!(out, "{text}")?;
        }
        Command::Functions { names_only } => {
            for function in session.engine.registry().iter() {
                if *names_only {
                    writeln!(out, "{}", function.name())?;
                } else {
                    writeln!(out, "{:<34} {}", function.name(), function.short_description())?;
                }
            }
        }
        Command::Usage { name, script } => match session.engine.usage(name, *script) {
            Some(usage) => writeln!(out, "{usage}")?,
            None => bail!("unknown function '{name}'"),
        },
    }

    out.flush()?;
    Ok(())
}

/// Engine plus the entity bound to `this`
struct Session {
    engine: ExpressionEngine,
    this: Option<EntityRef>,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self> {
        let store = match &cli.fixture {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("failed to read fixture {}", path.display()))?;
                let store = MemoryStore::from_json(&json)
                    .with_context(|| format!("invalid fixture {}", path.display()))?;
                info!(
                    fixture = %path.display(),
                    entities = store.entity_count(),
                    relationships = store.relationship_count(),
                    "Loaded fixture"
                );
                store
            }
            None => MemoryStore::new(),
        };

        let this = match &cli.this {
            Some(id) => match store.get(id) {
                Some(entity) => Some(entity),
                None => bail!("no entity with id '{id}' in the fixture"),
            },
            None => None,
        };

        let config = match &cli.config {
            Some(path) => StaticConfig::load(path)
                .with_context(|| format!("failed to read config {}", path.display()))?,
            None => StaticConfig::new(),
        };
        debug!(keys = config.len(), "Loaded configuration");

        let services = Services::builder()
            .store(Arc::new(store))
            .security(MemorySecurity::arc())
            .config(Arc::new(config))
            .localizer(Arc::new(MemoryLocalizer::new()))
            .processes(Arc::new(ShellProcessRunner::new()))
            .build();

        let engine_config = if cli.strict {
            EngineConfig::strict()
        } else {
            EngineConfig::from_env()
        };

        let engine = ExpressionEngine::builder()
            .services(services)
            .config(engine_config)
            .build();

        Ok(Self { engine, this })
    }

    /// Evaluate one expression, returning its value and anything it printed
    fn eval(&self, expression: &str, script: bool) -> Result<(Value, String)> {
        let mut ctx = ActionContext::new();
        ctx.set_script(script);
        let value = self.engine.evaluate(expression, &mut ctx, self.this.as_ref())?;
        Ok((value, ctx.take_output()))
    }

    fn render(&self, template: &str) -> Result<String> {
        let mut ctx = ActionContext::new();
        Ok(self.engine.render(template, &mut ctx, self.this.as_ref())?)
    }
}

fn read_template(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut source = String::new();
        io::stdin()
            .read_to_string(&mut source)
            .context("failed to read template from stdin")?;
        Ok(source)
    } else {
        fs::read_to_string(path).with_context(|| format!("failed to read template {}", path.display()))
    }
}
