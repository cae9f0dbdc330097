#![forbid(unsafe_code)]

//! `script-commander-ctl`: command-line client for `script-commander`.
//!
//! Connects to the IPC socket and sends JSON commands to the daemon.
//! `watch` keeps the connection open and prints events as they arrive.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use interprocess::local_socket::{traits::Stream as _, GenericNamespaced, Stream, ToNsName};

type CtlResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(Debug, Parser)]
#[command(
    name = "script-commander-ctl",
    about = "Local CLI for the script-commander daemon",
    version,
    long_about = None
)]
struct Cli {
    /// IPC socket name (must match the daemon's `ipc_name` config).
    #[arg(long, default_value = "script-commander")]
    ipc_name: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the directory the UI should open initially.
    DefaultPath,

    /// Summarise a project's package.json.
    Load {
        /// Project directory.
        path: PathBuf,
    },

    /// Open the native folder chooser.
    SelectFolder,

    /// Start a script.
    Run {
        /// Script name from package.json.
        script: String,
        /// Project directory.
        #[arg(long)]
        project: PathBuf,
    },

    /// Stop a running script.
    Stop {
        /// Script name.
        script: String,
    },

    /// List running scripts.
    List,

    /// Show details of a running script.
    Info {
        /// Script name.
        script: String,
    },

    /// Open a URL in the default browser.
    OpenUrl {
        /// URL to open.
        url: String,
    },

    /// Reveal a path in the system file browser.
    Reveal {
        /// Path to reveal.
        path: PathBuf,
    },

    /// Install project dependencies and wait for completion.
    Install {
        /// Project directory.
        path: PathBuf,
    },

    /// Stream script output and exit events until interrupted.
    Watch,
}

impl Command {
    fn to_request(&self) -> serde_json::Value {
        match self {
            Self::DefaultPath => serde_json::json!({ "command": "get-default-path" }),
            Self::Load { path } => serde_json::json!({ "command": "load-project", "path": path }),
            Self::SelectFolder => serde_json::json!({ "command": "select-folder" }),
            Self::Run { script, project } => serde_json::json!({
                "command": "run-script",
                "project_path": project,
                "script_name": script,
            }),
            Self::Stop { script } => {
                serde_json::json!({ "command": "stop-script", "script_name": script })
            }
            Self::List => serde_json::json!({ "command": "get-running-scripts" }),
            Self::Info { script } => {
                serde_json::json!({ "command": "script-info", "script_name": script })
            }
            Self::OpenUrl { url } => serde_json::json!({ "command": "open-url", "url": url }),
            Self::Reveal { path } => serde_json::json!({ "command": "open-in-finder", "path": path }),
            Self::Install { path } => serde_json::json!({ "command": "install-deps", "path": path }),
            Self::Watch => serde_json::json!({ "command": "subscribe" }),
        }
    }
}

fn main() {
    let args = Cli::parse();
    let request_json = args.command.to_request();
    let watch = matches!(args.command, Command::Watch);

    let result = if watch {
        watch_events(&args.ipc_name, &request_json)
    } else {
        send_ipc_command(&args.ipc_name, &request_json).map(|response| print_response(&response))
    };

    if let Err(err) = result {
        eprintln!("Failed to talk to daemon: {err}");
        eprintln!("Is script-commander running with ipc_name '{}'?", args.ipc_name);
        std::process::exit(1);
    }
}

fn print_response(response: &serde_json::Value) {
    let Some(obj) = response.as_object() else {
        println!("{response}");
        return;
    };

    let ok = obj
        .get("ok")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);
    if ok {
        if let Some(data) = obj.get("data") {
            println!("{}", serde_json::to_string_pretty(data).unwrap_or_default());
        } else {
            println!("OK");
        }
    } else {
        let err_msg = obj
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error");
        eprintln!("Error: {err_msg}");
        std::process::exit(1);
    }
}

fn connect(ipc_name: &str, request: &serde_json::Value) -> CtlResult<Stream> {
    let name = ipc_name.to_ns_name::<GenericNamespaced>()?;
    let mut stream = Stream::connect(name)?;

    // Send request as a single JSON line.
    let mut request_line = serde_json::to_string(request)?;
    request_line.push('\n');
    stream.write_all(request_line.as_bytes())?;
    stream.flush()?;
    Ok(stream)
}

/// Connect to the IPC socket, send a JSON command, and read the response.
fn send_ipc_command(ipc_name: &str, request: &serde_json::Value) -> CtlResult<serde_json::Value> {
    let stream = connect(ipc_name, request)?;

    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line)?;

    let response: serde_json::Value = serde_json::from_str(response_line.trim())?;
    Ok(response)
}

/// Subscribe and print one line per event until the daemon hangs up.
fn watch_events(ipc_name: &str, request: &serde_json::Value) -> CtlResult<()> {
    let stream = connect(ipc_name, request)?;
    let reader = BufReader::new(&stream);

    for line in reader.lines() {
        let line = line?;
        let Ok(value) = serde_json::from_str::<serde_json::Value>(line.trim()) else {
            continue;
        };

        if value.get("ok").is_some() {
            // Subscription acknowledgement.
            if value.get("ok").and_then(serde_json::Value::as_bool) != Some(true) {
                print_response(&value);
            }
            continue;
        }

        print_event(&value);
    }

    Ok(())
}

fn print_event(event: &serde_json::Value) {
    let script = event.get("script").and_then(|v| v.as_str()).unwrap_or("?");
    match event.get("event").and_then(|v| v.as_str()) {
        Some("script-output") => {
            let data = event.get("data").and_then(|v| v.as_str()).unwrap_or_default();
            if event.get("type").and_then(|v| v.as_str()) == Some("stderr") {
                eprint!("[{script}] {data}");
            } else {
                print!("[{script}] {data}");
            }
            let _ = std::io::stdout().flush();
        }
        Some("script-exit") => match event.get("code").and_then(serde_json::Value::as_i64) {
            Some(code) => println!("[{script}] exited with code {code}"),
            None => println!("[{script}] terminated by signal"),
        },
        _ => println!("{event}"),
    }
}
