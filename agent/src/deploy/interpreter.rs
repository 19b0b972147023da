//! Program interpreter

use std::sync::Arc;

use futures::future::{try_join_all, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::deploy::process::CommandRunner;
use crate::deploy::program::{Invocation, Program};
use crate::deploy::progress::{ProgressSink, SinkObserver};
use crate::errors::AgentError;

/// How the children of a `Sequence` are executed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPolicy {
    /// One child at a time, in program order
    #[default]
    Sequential,
    /// All children at once; the first failure drops (and kills) the rest
    Concurrent,
}

/// Walks a [`Program`] tree, running invocations and reporting progress
#[derive(Clone)]
pub struct Interpreter {
    runner: Arc<dyn CommandRunner>,
    policy: ExecutionPolicy,
}

impl Interpreter {
    pub fn new(runner: Arc<dyn CommandRunner>, policy: ExecutionPolicy) -> Self {
        Self { runner, policy }
    }

    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    /// Execute the program, failing fast on the first failed invocation
    pub async fn execute(&self, program: &Program, sink: &dyn ProgressSink) -> Result<(), AgentError> {
        self.execute_node(program, sink).await
    }

    fn execute_node<'a>(
        &'a self,
        program: &'a Program,
        sink: &'a dyn ProgressSink,
    ) -> BoxFuture<'a, Result<(), AgentError>> {
        async move {
            match program {
                Program::LogMarker(message) => {
                    sink.append(message);
                    Ok(())
                }
                Program::Invocation(invocation) => self.invoke(invocation, sink).await,
                Program::Sequence(children) => match self.policy {
                    ExecutionPolicy::Sequential => {
                        for child in children {
                            self.execute_node(child, sink).await?;
                        }
                        Ok(())
                    }
                    ExecutionPolicy::Concurrent => {
                        try_join_all(children.iter().map(|child| self.execute_node(child, sink)))
                            .await
                            .map(|_| ())
                    }
                },
            }
        }
        .boxed()
    }

    async fn invoke(&self, invocation: &Invocation, sink: &dyn ProgressSink) -> Result<(), AgentError> {
        debug!("Running `{}`", invocation);
        let observer = SinkObserver::new(sink);
        match self.runner.run(invocation, &observer).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("`{}` failed: {}", invocation, e);
                Err(e)
            }
        }
    }
}
