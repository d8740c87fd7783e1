use crate::builtin;
use crate::command::{self, ExitCode, Target};
use crate::env::Environment;
use crate::error::{ShellError, StageError};
use crate::external::{ExternalCommand, Spawned};
use crate::io_adapters::StageInput;
use crate::job::JobTable;
use crate::parser::Segment;
use std::io::Write;

/// Wires the stages of one segment together and runs them to completion.
///
/// Builtins run inline and hand a buffer to the next stage. External commands are
/// spawned without waiting, each reading the previous stage's stdout, so data streams
/// through the whole chain while it runs.
pub(crate) struct Pipeline<'a> {
    env: &'a mut Environment,
    jobs: &'a mut JobTable,
}

impl<'a> Pipeline<'a> {
    pub(crate) fn new(env: &'a mut Environment, jobs: &'a mut JobTable) -> Self {
        Self { env, jobs }
    }

    /// Run `segment` with `input` feeding its first stage and drain the last stage into `sink`.
    ///
    /// Returns the exit code of the last non-empty stage. A stage that fails to start stops
    /// the chain: later stages are not started and processes already running upstream are
    /// left to finish on their own.
    pub(crate) fn run(
        &mut self,
        segment: &Segment,
        input: StageInput,
        sink: &mut dyn Write,
    ) -> Result<ExitCode, StageError> {
        let mut input = input;
        let mut spawned: Vec<Spawned> = Vec::new();
        let mut status: ExitCode = 0;
        let mut last_stage = String::new();
        let mut last_is_external = false;

        for stage in segment.stages() {
            let target = command::resolve(stage);
            match target {
                Target::NoOp => continue,
                Target::ExternalCommand { name, args } => {
                    match ExternalCommand::new(name.clone(), args).spawn(input, self.env) {
                        Ok((child, output)) => {
                            spawned.push(child);
                            input = output;
                        }
                        Err(error) => {
                            self.abandon(spawned);
                            return Err(StageError::new(name, error));
                        }
                    }
                    last_stage = name;
                    last_is_external = true;
                }
                target => {
                    let mut buffer = Vec::new();
                    status = match builtin::execute(&target, &mut buffer, self.env) {
                        Ok(code) => code,
                        Err(error) => {
                            self.abandon(spawned);
                            return Err(StageError::new(target.name(), error));
                        }
                    };
                    input = StageInput::Buffer(buffer);
                    last_stage = target.name().to_owned();
                    last_is_external = false;
                }
            }
        }

        let drained = input.drain_into(sink);
        let last_code = wait_all(spawned);
        if last_is_external {
            status = last_code;
        }

        match drained {
            Ok(bytes) => {
                tracing::debug!(stage = %last_stage, bytes, status, "segment completed");
                Ok(status)
            }
            Err(e) => Err(StageError::new(last_stage, ShellError::Stream(e))),
        }
    }

    fn abandon(&mut self, spawned: Vec<Spawned>) {
        for child in spawned {
            tracing::debug!(name = %child.name, pid = child.child.id(), "detaching upstream stage");
            self.jobs.detach(child.detach());
        }
    }
}

/// Wait on every process in stage order. Wait failures are logged, not returned.
///
/// Returns the exit code of the last process (1 if waiting on it failed).
fn wait_all(spawned: Vec<Spawned>) -> ExitCode {
    let mut last_code = 0;
    let mut first_error = None;
    for child in spawned {
        let name = child.name.clone();
        match child.wait() {
            Ok(code) => last_code = code,
            Err(e) => {
                last_code = 1;
                first_error.get_or_insert((name, e));
            }
        }
    }
    if let Some((name, e)) = first_error {
        tracing::warn!(stage = %name, error = %e, "waiting on stage failed");
    }
    last_code
}
