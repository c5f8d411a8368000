//! Toy build pipeline: two compilation units and a link step, driven from
//! the command line.
//!
//! ```text
//! cargo run --example build -- -j 2 'binary(hello)'
//! ```

use std::any::Any;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use tracing::info;

use taskmill::{cli, fingerprint, matches_as, Handler, NamedTaskSet, Task};

#[derive(Debug, PartialEq)]
struct Compile {
    source: String,
}

#[async_trait]
impl Task for Compile {
    fn hash(&self) -> u64 {
        fingerprint(&("compile", &self.source))
    }

    fn matches(&self, other: &dyn Task) -> bool {
        matches_as(self, other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn perform(&self, _handler: &Handler) -> anyhow::Result<()> {
        info!(source = %self.source, "compiling");
        tokio::time::sleep(Duration::from_millis(200)).await;
        info!(source = %self.source, "compiled");
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
struct Binary {
    name: String,
}

#[async_trait]
impl Task for Binary {
    fn hash(&self) -> u64 {
        fingerprint(&("binary", &self.name))
    }

    fn matches(&self, other: &dyn Task) -> bool {
        matches_as(self, other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn perform(&self, handler: &Handler) -> anyhow::Result<()> {
        for source in [format!("{}.c", self.name), "main.c".to_string()] {
            handler.require(Arc::new(Compile { source })).await;
        }
        handler.wait().await;
        info!(binary = %self.name, "linking");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let mut tasks = NamedTaskSet::new();
    tasks.register("binary", |arg| {
        let name = if arg.is_empty() { "hello" } else { arg };
        Ok(Arc::new(Binary {
            name: name.to_string(),
        }) as Arc<dyn Task>)
    });

    cli::run(&tasks, cli::Args::parse()).await
}
