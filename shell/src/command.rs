use crate::parser::Stage;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// What a stage dispatches to.
///
/// Built-ins form a fixed set; anything else is an [`Target::ExternalCommand`].
/// Resolution never fails: an unknown name only fails once it is spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Empty stage, forwards its input unchanged.
    NoOp,
    ChangeDirectory(Vec<String>),
    PrintWorkingDirectory(Vec<String>),
    Echo(Vec<String>),
    ListProcesses(Vec<String>),
    Terminate(Vec<String>),
    ExternalCommand { name: String, args: Vec<String> },
}

impl Target {
    /// Operation name as typed by the user, used to label diagnostics.
    pub fn name(&self) -> &str {
        match self {
            Target::NoOp => "",
            Target::ChangeDirectory(_) => "cd",
            Target::PrintWorkingDirectory(_) => "pwd",
            Target::Echo(_) => "echo",
            Target::ListProcesses(_) => "ps",
            Target::Terminate(_) => "kill",
            Target::ExternalCommand { name, .. } => name,
        }
    }
}

/// Map a stage's argument vector to its dispatch target.
pub fn resolve(stage: &Stage) -> Target {
    let Some(name) = stage.name() else {
        return Target::NoOp;
    };
    let args = stage.args().to_vec();
    match name {
        "cd" => Target::ChangeDirectory(args),
        "pwd" => Target::PrintWorkingDirectory(args),
        "echo" => Target::Echo(args),
        "ps" => Target::ListProcesses(args),
        "kill" => Target::Terminate(args),
        _ => Target::ExternalCommand {
            name: name.to_owned(),
            args,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(argv: &[&str]) -> Stage {
        Stage::new(argv.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_builtins_resolve_to_their_tags() {
        assert_eq!(
            resolve(&stage(&["cd", "/tmp"])),
            Target::ChangeDirectory(vec!["/tmp".to_string()])
        );
        assert_eq!(resolve(&stage(&["pwd"])), Target::PrintWorkingDirectory(vec![]));
        assert_eq!(
            resolve(&stage(&["echo", "a", "b"])),
            Target::Echo(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            resolve(&stage(&["ps", "-A"])),
            Target::ListProcesses(vec!["-A".to_string()])
        );
        assert_eq!(
            resolve(&stage(&["kill", "42"])),
            Target::Terminate(vec!["42".to_string()])
        );
    }

    #[test]
    fn test_unknown_name_is_external() {
        let target = resolve(&stage(&["no-such-tool", "-x"]));
        assert_eq!(
            target,
            Target::ExternalCommand {
                name: "no-such-tool".to_string(),
                args: vec!["-x".to_string()],
            }
        );
        assert_eq!(target.name(), "no-such-tool");
    }

    #[test]
    fn test_empty_stage_is_noop() {
        assert_eq!(resolve(&Stage::default()), Target::NoOp);
    }

    #[test]
    fn test_names_are_case_sensitive() {
        assert!(matches!(
            resolve(&stage(&["PWD"])),
            Target::ExternalCommand { .. }
        ));
    }
}
