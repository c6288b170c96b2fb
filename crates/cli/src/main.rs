use clap::{Parser, Subcommand};
use eamsync_core::callback::{ChoicePrompt, ProgressSink, Prompter, TextPrompt};
use eamsync_core::fetch::HttpTransport;
use eamsync_core::schedule::ScheduleEntry;
use eamsync_core::{conflate, dom, extract, ImportConfig, Importer};
use std::io::Write;

#[derive(Parser)]
#[command(name = "eamsync", about = "Course schedule importer for EAMS-family registration portals")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to a portal and import the schedule as JSON
    Import {
        /// Portal entry URL (the page your browser session sits on)
        url: String,

        /// Path segment tunneled (WebVPN) deployments insert after the base
        #[arg(long, default_value = "ahpu")]
        segment: String,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Extract a schedule from a saved course-table payload
    Parse {
        /// The payload file to parse (use - for stdin)
        file: String,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
}

/// Prompter over stdin/stderr; re-prompts until the input validates.
struct StdinPrompter;

impl StdinPrompter {
    fn read_line(&self) -> Option<String> {
        let mut buf = String::new();
        match std::io::stdin().read_line(&mut buf) {
            Ok(0) => None,
            Ok(_) => Some(buf.trim_end_matches(['\r', '\n']).to_string()),
            Err(_) => None,
        }
    }
}

impl Prompter for StdinPrompter {
    fn text(&self, prompt: &TextPrompt) -> Option<String> {
        loop {
            eprint!("{}", prompt.title);
            if !prompt.hint.is_empty() {
                eprint!(" ({})", prompt.hint);
            }
            eprint!(": ");
            let _ = std::io::stderr().flush();

            let line = self.read_line()?;
            let value = if line.is_empty() && !prompt.default.is_empty() {
                prompt.default.clone()
            } else {
                line
            };
            match (prompt.validate)(&value) {
                None => return Some(value),
                Some(message) => eprintln!("{}", message),
            }
        }
    }

    fn choose(&self, prompt: &ChoicePrompt) -> Option<String> {
        eprintln!("{}", prompt.title);
        if !prompt.body.is_empty() {
            eprintln!("{}", prompt.body);
        }
        for option in &prompt.options {
            eprintln!("  {}", option);
        }
        eprint!("> ");
        let _ = std::io::stderr().flush();

        let line = self.read_line()?;
        if line.is_empty() {
            return prompt.options.first().cloned();
        }
        // Accept either a bare index or a full option label.
        prompt
            .options
            .iter()
            .find(|option| option.as_str() == line || option.starts_with(&format!("{}:", line)))
            .cloned()
            .or(Some(line))
    }
}

/// Progress on stderr so stdout stays a clean JSON stream.
struct StderrSink;

impl ProgressSink for StderrSink {
    fn report(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn fail(&self, message: &str) {
        eprintln!("错误: {}", message);
    }

    fn image(&self, url: &str) {
        eprintln!("验证码图片: {}", url);
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Import { url, segment, pretty } => {
            let transport = match HttpTransport::new() {
                Ok(transport) => transport,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            let config = ImportConfig {
                entry_url: url,
                tunnel_segment: segment,
                ..Default::default()
            };
            let importer = Importer::new(&transport, &StdinPrompter, &StderrSink, config);
            print_entries(&importer.run(), pretty);
        }
        Commands::Parse { file, pretty } => {
            let payload = if file == "-" {
                use std::io::Read;
                let mut buf = String::new();
                if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
                    eprintln!("Error: failed to read stdin: {}", e);
                    std::process::exit(1);
                }
                buf
            } else {
                match std::fs::read_to_string(&file) {
                    Ok(payload) => payload,
                    Err(e) => {
                        eprintln!("Error: failed to read {}: {}", file, e);
                        std::process::exit(1);
                    }
                }
            };

            let mut occurrences = extract::extract_script_occurrences(&payload);
            if occurrences.is_empty() {
                let doc = dom::parse_html(&payload);
                occurrences = extract::table::extract_table_occurrences(
                    &doc,
                    eamsync_core::schedule::DEFAULT_TERM_WEEKS,
                );
            }
            print_entries(&conflate::conflate(&occurrences), pretty);
        }
    }
}

fn print_entries(entries: &[ScheduleEntry], pretty: bool) {
    let json = if pretty {
        serde_json::to_string_pretty(entries)
    } else {
        serde_json::to_string(entries)
    };
    match json {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
