use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use prscope_core::{
    ChangedFile, CommentMode, ConfigOverrides, OutputFormat, PrscopeConfig, ProviderKind,
    ReviewProfile, CONFIG_FILENAMES,
};
use prscope_difflens::parser::{split_unified_diff, FilePatch};
use prscope_review::github::{CommentAction, GitHubClient, PullRequestRef};
use prscope_review::llm::create_provider;
use prscope_review::pipeline::ReviewPipeline;

const CONFIG_FILE: &str = "prscope.config.json";
const WORKFLOW_FILE: &str = ".github/workflows/prscope.yml";

#[derive(Parser)]
#[command(
    name = "prscope",
    version,
    about = "AI pull request review with noise filtering and diff budgets",
    long_about = "PRScope reviews pull requests with the model of your choice.\n\n\
                   Lockfiles, build output, and vendored code are dropped before the model sees\n\
                   anything; the remaining diffs are fit into a byte budget, reviewed in a single\n\
                   call, validated against a strict schema, and rendered as one PR comment.\n\n\
                   Examples:\n  \
                     prscope init --provider openai --model gpt-4o --workflow\n  \
                     prscope review --pr owner/repo#42          Review a GitHub pull request\n  \
                     prscope review --pr owner/repo#42 --post   Review and post the comment\n  \
                     git diff main | prscope review --diff -    Review a local diff\n  \
                     prscope models --provider ollama           List available models"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: prscope.config.json, .prscopeRC.json, or .prscope.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         markdown  The PR comment exactly as posted (default for review)\n  \
                         text      Human-readable summary (default for other commands)\n  \
                         json      Machine-readable JSON with camelCase keys"
    )]
    format: Option<OutputFormat>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Review a pull request or a diff with the configured model
    #[command(long_about = "Review a pull request or a diff with the configured model.\n\n\
        Changed files come from --pr, --files, or --diff. Without any of them the pull request\n\
        is taken from the GitHub Actions event; other events are skipped.\n\
        The review always produces a comment: model or schema failures yield a fallback\n\
        comment that explains what went wrong.\n\n\
        Examples:\n  prscope review --pr owner/repo#42\n  prscope review --files changes.json --format json\n  \
        git diff main | prscope review --diff -\n  prscope review --post --comment-mode inline+summary")]
    Review {
        /// GitHub pull request (owner/repo#123)
        #[arg(long, conflicts_with_all = ["files", "diff"])]
        pr: Option<String>,

        /// JSON array of changed files in the GitHub pull request files shape ('-' for stdin)
        #[arg(long, conflicts_with = "diff")]
        files: Option<PathBuf>,

        /// Unified diff to review ('-' for stdin)
        #[arg(long)]
        diff: Option<PathBuf>,

        /// Post (or update) the review comment on the pull request
        #[arg(long)]
        post: bool,

        #[command(flatten)]
        provider: ProviderArgs,

        /// Review emphasis (balanced, security, performance, strict)
        #[arg(long)]
        profile: Option<ReviewProfile>,

        /// How results are posted (summary-only, inline+summary)
        #[arg(long)]
        comment_mode: Option<CommentMode>,

        /// Maximum number of files sent to the model
        #[arg(long)]
        max_files: Option<usize>,

        /// Total diff byte budget across all files
        #[arg(long)]
        max_diff_bytes: Option<usize>,

        /// Extra glob pattern to skip (repeatable)
        #[arg(long = "skip")]
        skip: Vec<String>,
    },
    /// List the models the configured provider offers
    #[command(long_about = "List the models the configured provider offers.\n\n\
        Examples:\n  prscope models\n  prscope models --provider ollama --model any\n  prscope models --format json")]
    Models {
        #[command(flatten)]
        provider: ProviderArgs,
    },
    /// Create prscope.config.json and optionally a GitHub Actions workflow
    #[command(long_about = "Create prscope.config.json in the current directory.\n\n\
        Refuses to overwrite existing files. With --workflow, also writes\n\
        .github/workflows/prscope.yml that runs the review on every pull request.\n\n\
        Examples:\n  prscope init --provider openai --model gpt-4o\n  \
        prscope init --provider ollama --model llama3.1 --base-url http://gpu-box:11434 --workflow")]
    Init {
        /// Model provider (openai, anthropic, openai-compat, ollama)
        #[arg(long, default_value = "openai")]
        provider: ProviderKind,

        /// Model identifier
        #[arg(long)]
        model: String,

        /// Environment variable holding the API key (default depends on provider)
        #[arg(long)]
        api_key_env: Option<String>,

        /// Custom base URL for the provider API
        #[arg(long)]
        base_url: Option<String>,

        /// Review emphasis
        #[arg(long, default_value = "balanced")]
        profile: ReviewProfile,

        /// How results are posted
        #[arg(long, default_value = "summary-only")]
        comment_mode: CommentMode,

        /// Also write .github/workflows/prscope.yml
        #[arg(long)]
        workflow: bool,
    },
    /// Generate shell completions
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Provider settings that override the config file.
#[derive(Args)]
struct ProviderArgs {
    /// Model provider (openai, anthropic, openai-compat, ollama)
    #[arg(long)]
    provider: Option<ProviderKind>,

    /// Model identifier
    #[arg(long)]
    model: Option<String>,

    /// Environment variable holding the API key
    #[arg(long)]
    api_key_env: Option<String>,

    /// Custom base URL for the provider API
    #[arg(long)]
    base_url: Option<String>,
}

impl ProviderArgs {
    fn into_overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            provider: self.provider,
            model: self.model,
            api_key_env: self.api_key_env,
            base_url: self.base_url,
            ..ConfigOverrides::default()
        }
    }
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1mprscope\x1b[0m v{version} — AI pull request review\n");

        println!("Quick start:");
        println!("  \x1b[36mprscope init --model gpt-4o --workflow\x1b[0m   Set up config and CI workflow");
        println!("  \x1b[36mprscope review --pr owner/repo#1\x1b[0m         Review a pull request\n");

        println!("All commands:");
        println!("  \x1b[32mreview\x1b[0m  Review a pull request, a files listing, or a diff");
        println!("  \x1b[32mmodels\x1b[0m  List models offered by the configured provider");
        println!("  \x1b[32minit\x1b[0m    Create configuration and workflow files\n");
    } else {
        println!("prscope v{version} — AI pull request review\n");

        println!("Quick start:");
        println!("  prscope init --model gpt-4o --workflow   Set up config and CI workflow");
        println!("  prscope review --pr owner/repo#1         Review a pull request\n");

        println!("All commands:");
        println!("  review  Review a pull request, a files listing, or a diff");
        println!("  models  List models offered by the configured provider");
        println!("  init    Create configuration and workflow files\n");
    }

    println!("Run 'prscope <command> --help' for details.");
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("prscope=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("prscope=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read a file, or stdin when the path is `-`.
fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .into_diagnostic()
            .wrap_err("reading stdin")?;
        return Ok(input);
    }
    std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err(format!("reading {}", path.display()))
}

/// File config (explicit or discovered) with command-line overrides on top.
fn resolve_config(explicit: Option<&Path>, overrides: ConfigOverrides) -> Result<PrscopeConfig> {
    let file_config = match explicit {
        Some(path) => Some(PrscopeConfig::from_file(path)?),
        None => {
            let cwd = std::env::current_dir().into_diagnostic()?;
            PrscopeConfig::discover(&cwd)?.map(|(path, config)| {
                debug!(path = %path.display(), "loaded config");
                config
            })
        }
    };

    let config = match file_config {
        Some(base) => overrides.apply_to(base)?,
        None => overrides.into_config().map_err(|e| {
            miette::miette!(
                help = "Run 'prscope init' to create prscope.config.json, or pass --provider and --model",
                "{}",
                e
            )
        })?,
    };
    debug!(
        provider = %config.provider,
        model = %config.model,
        profile = %config.profile,
        "resolved config"
    );
    Ok(config)
}

fn spinner(message: &'static str) -> Option<indicatif::ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    pb.set_style(
        indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
            .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Some(pb)
}

fn parse_changed_files(json: &str) -> Result<Vec<ChangedFile>> {
    serde_json::from_str(json)
        .into_diagnostic()
        .wrap_err("changed files must be a JSON array of {filename, status, patch?, additions?, deletions?}")
}

fn workflow_yaml(api_key_env: &str) -> String {
    WORKFLOW_TEMPLATE.replace("__API_KEY_ENV__", api_key_env)
}

const WORKFLOW_TEMPLATE: &str = r#"name: PRScope Review

on:
  pull_request:
    types: [opened, synchronize, reopened, ready_for_review]

permissions:
  contents: read
  pull-requests: write

jobs:
  review:
    name: PRScope
    runs-on: ubuntu-latest
    if: ${{ !github.event.pull_request.draft }}
    steps:
      - name: Checkout
        uses: actions/checkout@v4

      - name: Install PRScope
        run: cargo install --locked --git https://github.com/KinanNasri/PRScope prscope

      - name: Run PRScope
        run: prscope review --post
        env:
          GITHUB_TOKEN: ${{ secrets.GITHUB_TOKEN }}
          __API_KEY_ENV__: ${{ secrets.__API_KEY_ENV__ }}
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    match cli.command {
        None => {
            print_welcome(use_color);
            return Ok(());
        }
        Some(Command::Review {
            pr,
            files,
            diff,
            post,
            provider,
            profile,
            comment_mode,
            max_files,
            max_diff_bytes,
            skip,
        }) => {
            let overrides = ConfigOverrides {
                profile,
                comment_mode,
                max_files,
                max_diff_bytes,
                skip_patterns: skip,
                ..provider.into_overrides()
            };
            let pr_ref = match &pr {
                Some(r) => Some(PullRequestRef::parse(r)?),
                None if files.is_none() && diff.is_none() => PullRequestRef::from_actions_env()?,
                None => None,
            };
            if pr_ref.is_none() && files.is_none() && diff.is_none() {
                if std::env::var_os("GITHUB_ACTIONS").is_some() {
                    info!("not a pull request event, skipping");
                    return Ok(());
                }
                miette::bail!(miette::miette!(
                    help = "Pass --pr owner/repo#123, --files changes.json, or --diff changes.patch",
                    "nothing to review"
                ));
            }
            if post && pr_ref.is_none() {
                miette::bail!(miette::miette!(
                    help = "Use --pr owner/repo#123 to choose the pull request to comment on",
                    "--post needs a pull request"
                ));
            }

            let config = resolve_config(cli.config.as_deref(), overrides)?;
            let github = match &pr_ref {
                Some(_) => Some(GitHubClient::new(None)?),
                None => None,
            };

            let changed: Vec<ChangedFile> = match (&files, &diff, &github, &pr_ref) {
                (Some(path), _, _, _) => parse_changed_files(&read_input(path)?)?,
                (None, Some(path), _, _) => split_unified_diff(&read_input(path)?)
                    .into_iter()
                    .map(FilePatch::into_changed_file)
                    .collect(),
                (None, None, Some(github), Some(pr)) => {
                    info!(pr = %pr, "fetching changed files");
                    github.list_changed_files(pr).await?
                }
                _ => Vec::new(),
            };

            let mode = config.comment_mode;
            let pipeline = ReviewPipeline::from_config(config);

            let pb = spinner("Reviewing changes...");
            let report = pipeline.run(&changed).await;
            if let Some(pb) = pb {
                pb.finish_with_message(if report.outcome.is_fallback() {
                    "Review incomplete"
                } else {
                    "Done"
                });
            }

            match cli.format.unwrap_or(OutputFormat::Markdown) {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
                }
                OutputFormat::Markdown => print!("{}", report.comment()),
                OutputFormat::Text => print!("{report}"),
            }

            if let (true, Some(github), Some(pr)) = (post, &github, &pr_ref) {
                match github.upsert_comment(pr, &report.comment()).await? {
                    CommentAction::Created(id) => info!(pr = %pr, comment = id, "posted review"),
                    CommentAction::Updated(id) => info!(pr = %pr, comment = id, "updated review"),
                }

                if mode == CommentMode::InlineAndSummary {
                    if let Some(result) = report.outcome.review() {
                        match github.post_inline_findings(pr, &result.findings).await {
                            Ok(count) => info!(count, "posted inline findings"),
                            Err(e) => warn!(error = %e, "could not post inline findings"),
                        }
                    }
                }
            }
        }
        Some(Command::Models { provider }) => {
            let config = resolve_config(cli.config.as_deref(), provider.into_overrides())?;
            let client = create_provider(&config)?;

            let pb = spinner("Fetching models...");
            let models = client.list_models().await.inspect_err(|_e| {
                if let Some(pb) = &pb {
                    pb.finish_with_message("Failed");
                }
            })?;
            if let Some(pb) = pb {
                pb.finish_and_clear();
            }

            match cli.format.unwrap_or_default() {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&models).into_diagnostic()?);
                }
                OutputFormat::Markdown => {
                    println!("| Model | Name |\n|-------|------|");
                    for m in &models {
                        println!("| `{}` | {} |", m.id, m.name);
                    }
                }
                OutputFormat::Text => {
                    if models.is_empty() {
                        println!("No models reported by {}.", config.provider);
                    }
                    for m in &models {
                        if m.name == m.id {
                            println!("{}", m.id);
                        } else {
                            println!("{}  ({})", m.id, m.name);
                        }
                    }
                }
            }
        }
        Some(Command::Init {
            provider,
            model,
            api_key_env,
            base_url,
            profile,
            comment_mode,
            workflow,
        }) => {
            let config_path = Path::new(CONFIG_FILE);
            for name in CONFIG_FILENAMES {
                if Path::new(name).exists() {
                    miette::bail!("{name} already exists");
                }
            }
            let workflow_path = Path::new(WORKFLOW_FILE);
            if workflow && workflow_path.exists() {
                miette::bail!("{WORKFLOW_FILE} already exists");
            }

            let api_key_env =
                api_key_env.unwrap_or_else(|| provider.default_api_key_env().to_string());
            let mut config = PrscopeConfig::new(provider, model, api_key_env);
            config.base_url = base_url;
            config.profile = profile;
            config.comment_mode = comment_mode;
            config.validate()?;

            let json = serde_json::to_string_pretty(&config).into_diagnostic()?;
            std::fs::write(config_path, json + "\n").into_diagnostic()?;
            println!("Created {CONFIG_FILE}");

            if workflow {
                if let Some(dir) = workflow_path.parent() {
                    std::fs::create_dir_all(dir).into_diagnostic()?;
                }
                std::fs::write(workflow_path, workflow_yaml(&config.api_key_env))
                    .into_diagnostic()?;
                println!("Created {WORKFLOW_FILE}");
            }

            println!("\nNext steps:");
            println!(
                "  1. Add a repository secret named {} (Settings → Secrets and variables → Actions)",
                config.api_key_env
            );
            if workflow {
                println!("  2. Commit {CONFIG_FILE} and {WORKFLOW_FILE}");
            } else {
                println!("  2. Commit {CONFIG_FILE} and add a workflow step that runs 'prscope review --post'");
            }
            println!("  3. Open a pull request to get a review");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "prscope", &mut std::io::stdout());
        }
    }

    Ok(())
}
