use libcnb::data::launch::{Launch, LaunchBuilder, ProcessBuilder};
use libcnb::data::process_type;
use libjvmbuildpack::stack::StackCapability;
use std::path::Path;

/// The command that starts Tomcat, split into the executable and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StartCommand {
    pub(crate) command: String,
    pub(crate) args: Vec<String>,
}

/// Stacks with a shell start Tomcat through `catalina.sh`. Shell-less stacks invoke the JVM
/// directly, so `setenv.sh` and the `CATALINA_*` variables have no effect there.
pub(crate) fn start_command(
    stack: StackCapability,
    home_dir: &Path,
    base_dir: &Path,
    logging_jar: &str,
    jsse_opts: &str,
) -> StartCommand {
    match stack {
        StackCapability::Shell => StartCommand {
            command: String::from("sh"),
            args: vec![
                home_dir.join("bin").join("catalina.sh").display().to_string(),
                String::from("run"),
            ],
        },
        StackCapability::Shellless => StartCommand {
            command: String::from("java"),
            args: vec![
                format!(
                    "-Djava.util.logging.config.file={}",
                    base_dir.join("conf").join("logging.properties").display()
                ),
                String::from("-Djava.util.logging.manager=org.apache.juli.ClassLoaderLogManager"),
                String::from(jsse_opts),
                String::from("-classpath"),
                format!(
                    "{}:{}:{}",
                    base_dir.join("bin").join(logging_jar).display(),
                    home_dir.join("bin").join("bootstrap.jar").display(),
                    home_dir.join("bin").join("tomcat-juli.jar").display()
                ),
                format!("-Dcatalina.home={}", home_dir.display()),
                format!("-Dcatalina.base={}", base_dir.display()),
                String::from("org.apache.catalina.startup.Bootstrap"),
                String::from("start"),
            ],
        },
    }
}

/// Registers the `task`, `tomcat` and `web` process types, all running the same command. Only
/// `web` is the default process.
pub(crate) fn launch(start_command: &StartCommand) -> Launch {
    let process = |process_type, default| {
        ProcessBuilder::new(process_type, [start_command.command.as_str()])
            .args(start_command.args.iter().map(String::as_str))
            .default(default)
            .build()
    };

    LaunchBuilder::new()
        .process(process(process_type!("task"), false))
        .process(process(process_type!("tomcat"), false))
        .process(process(process_type!("web"), true))
        .build()
}
