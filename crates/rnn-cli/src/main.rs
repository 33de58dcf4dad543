//! RNN - Rat News Network pipeline CLI
//!
//! The `rnn` command generates satirical article batches and publishes the
//! rendered site to its hosting repository.
//!
//! ## Commands
//!
//! - `deploy`: generate (or reuse) articles, render, write the sitemap, push
//! - `ideas`: print fresh article ideas
//! - `article`: assemble a single article from a premise
//! - `parody`: extract a third-party article and derive a parody premise
//! - `sitemap`: write `sitemap.xml` for a rendered site

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

use rnn_core::{
    AssemblyConfig, AutoApprove, CommandRenderer, ContentAssembler, DeployOutcome,
    DeploymentOrchestrator, DeploymentTarget, GenerationService, Idea, IdeaSource,
    OpenAiGenerationService, ParodyExtractor, ParodyPolicy, Pipeline, PipelineConfig, PushGate,
    RetryPolicy, StdinPrompt,
};
use rnn_genai::{NewsApiClient, OpenAiClient, PageFetcher, Secret};

const DEFAULT_REPO: &str = "https://github.com/davidhaas6/rat-news-network-frontend.git";

#[derive(Parser)]
#[command(name = "rnn")]
#[command(author = "Rat News Network")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate and publish Rat News Network articles", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate articles, render the site and push it to the hosting repository
    Deploy(DeployArgs),

    /// Print fresh article ideas as JSON
    Ideas {
        /// Number of ideas to request
        #[arg(default_value = "5")]
        count: usize,
    },

    /// Assemble one article from a premise and write its artifact
    Article {
        /// Premise of the article
        idea: String,

        /// Working title (the generator picks one when omitted)
        #[arg(long, default_value = "")]
        title: String,

        /// Directory receiving the article JSON
        #[arg(long, default_value = "out/articles/single")]
        articles: PathBuf,
    },

    /// Extract an article from a URL and derive a parody premise
    Parody {
        /// URL of the article to parody
        url: String,

        /// Write the extracted article here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write sitemap.xml for a rendered site
    Sitemap {
        /// Public base URL of the site
        base_url: String,

        /// Directory containing the rendered site
        site_dir: PathBuf,
    },
}

#[derive(clap::Args)]
struct DeployArgs {
    /// URL of the repository to deploy to
    #[arg(long, env = "RNN_REPO_URL", default_value = DEFAULT_REPO)]
    repo: String,

    /// Number of articles to generate (0 reuses articles from --articles)
    #[arg(long, env = "RNN_NUM_ARTICLES", default_value = "0")]
    num: usize,

    /// Directory to save or load articles
    #[arg(long, env = "RNN_ARTICLES_DIR")]
    articles: Option<PathBuf>,

    /// Root for dated article and site output directories
    #[arg(long, env = "RNN_OUT_DIR", default_value = "out")]
    out: PathBuf,

    /// Branch to deploy to
    #[arg(long, env = "RNN_BRANCH", default_value = "main")]
    branch: String,

    /// Keep the local clone after deployment
    #[arg(long)]
    keep_local: bool,

    /// Push without asking for confirmation
    #[arg(long)]
    auto: bool,

    /// Local clone location (default: <out>/repo)
    #[arg(long, env = "RNN_WORKDIR")]
    workdir: Option<PathBuf>,

    /// Public base URL used in the sitemap
    #[arg(long, env = "RNN_BASE_URL", default_value = "https://ratnewsnetwork.com")]
    base_url: String,

    /// Maximum article assemblies in flight
    #[arg(long, env = "RNN_CONCURRENCY", default_value = "4")]
    concurrency: usize,

    /// Site render command; invoked with the articles and site directories appended
    #[arg(long, env = "RNN_RENDER_CMD")]
    render_cmd: String,

    /// Never include parody articles
    #[arg(long)]
    no_parody: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    rnn_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Deploy(args) => cmd_deploy(args).await,
        Commands::Ideas { count } => cmd_ideas(count).await,
        Commands::Article {
            idea,
            title,
            articles,
        } => cmd_article(&idea, &title, &articles).await,
        Commands::Parody { url, output } => cmd_parody(&url, output.as_deref()).await,
        Commands::Sitemap { base_url, site_dir } => cmd_sitemap(&base_url, &site_dir),
    }
}

fn generation_service() -> Result<Arc<dyn GenerationService>> {
    let client = OpenAiClient::from_env().context("Failed to configure the generation service")?;
    Ok(Arc::new(OpenAiGenerationService::new(client)))
}

/// Cancels the batch on Ctrl-C; in-flight articles stop at the next step.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling batch");
            child.cancel();
        }
    });
    token
}

async fn cmd_deploy(args: DeployArgs) -> Result<()> {
    if args.concurrency == 0 {
        bail!("--concurrency must be at least 1");
    }

    let mut config = PipelineConfig::new(&args.out, Local::now());
    config.num_articles = args.num;
    config.concurrency = args.concurrency;
    config.base_url = args.base_url.clone();
    if let Some(dir) = &args.articles {
        config.assembly.article_dir = dir.clone();
    } else if args.num == 0 {
        bail!("--articles is required when --num is 0");
    }
    if args.no_parody {
        config.parody = ParodyPolicy::disabled();
    }

    let service = generation_service()?;
    let renderer = CommandRenderer::from_command_line(&args.render_cmd)
        .context("Invalid --render-cmd")?;

    let mut target = DeploymentTarget::new(
        &args.repo,
        args.workdir.clone().unwrap_or_else(|| args.out.join("repo")),
    )
    .with_branch(&args.branch)
    .keep_local(args.keep_local);
    match Secret::from_env("GITHUB_PAT") {
        Some(token) => target = target.with_credential(token),
        None => info!("GITHUB_PAT not set, pushing with ambient git credentials"),
    }
    let gate: Arc<dyn PushGate> = if args.auto {
        Arc::new(AutoApprove)
    } else {
        Arc::new(StdinPrompt)
    };

    let fetcher = PageFetcher::new().context("Failed to build page fetcher")?;
    let mut pipeline = Pipeline::new(config, service, Arc::new(renderer))
        .with_image_fetcher(Arc::new(fetcher.clone()))
        .with_deployment(DeploymentOrchestrator::new(target, gate))
        .with_cancel(cancel_on_ctrl_c());
    if args.num > 0 && !args.no_parody {
        match NewsApiClient::from_env() {
            Ok(news) => {
                pipeline = pipeline.with_parody_sources(Arc::new(fetcher), Arc::new(news));
            }
            Err(e) => warn!(error = %e, "news source unavailable, generating without parodies"),
        }
    }

    let summary = pipeline.run().await.context("Pipeline failed")?;

    if let Some(batch) = &summary.batch {
        println!(
            "Batch: {} ready, {} failed, {} cancelled",
            batch.ready_count(),
            batch.failed_count(),
            batch.cancelled_count()
        );
        for (index, reason) in batch.failures() {
            println!("  [{index}] {reason}");
        }
    }
    println!("Articles: {}", summary.article_dir.display());
    if let Some(staged) = &summary.staged_dir {
        println!("Rendered from: {}", staged.display());
    }
    let Some(site_dir) = &summary.site_dir else {
        bail!("No ready articles; nothing was rendered or deployed");
    };
    println!("Site: {}", site_dir.display());

    if let Some(report) = &summary.deployment {
        match report.outcome {
            DeployOutcome::Pushed => println!(
                "Pushed {}",
                report.commit_sha.as_deref().unwrap_or("(unknown commit)")
            ),
            DeployOutcome::NoChanges => println!("No changes to deploy"),
            DeployOutcome::PushDeclined => println!("Push declined"),
        }
        if let Some(path) = &report.working_copy {
            println!("Local clone kept at {}", path.display());
        }
    }
    Ok(())
}

async fn cmd_ideas(count: usize) -> Result<()> {
    let source = IdeaSource::new(generation_service()?, RetryPolicy::default());
    let ideas = source
        .generate_ideas(count)
        .await
        .context("Failed to generate ideas")?;
    println!("{}", serde_json::to_string_pretty(&ideas)?);
    Ok(())
}

async fn cmd_article(premise: &str, title: &str, articles: &Path) -> Result<()> {
    let fetcher = PageFetcher::new().context("Failed to build page fetcher")?;
    let assembler = ContentAssembler::new(generation_service()?, AssemblyConfig::new(articles))
        .context("Failed to prepare article directory")?
        .with_image_fetcher(Arc::new(fetcher));
    let idea = Idea::original(title, premise, "News");
    let idea_id = idea.id;
    let article = assembler
        .assemble(idea)
        .await
        .context("Failed to assemble article")?;

    println!("{}", serde_json::to_string_pretty(&article)?);
    eprintln!(
        "Saved {}",
        assembler.store().artifact_path(idea_id).display()
    );
    Ok(())
}

async fn cmd_parody(url: &str, output: Option<&Path>) -> Result<()> {
    let fetcher = PageFetcher::new().context("Failed to build page fetcher")?;
    let extractor = ParodyExtractor::new(
        generation_service()?,
        Arc::new(fetcher),
        RetryPolicy::default(),
    );
    let source = extractor
        .extract(url)
        .await
        .with_context(|| format!("Failed to extract {url}"))?;

    let article = source.extracted();
    let text = format!(
        "# {}\n\nBy {}\n\n{}",
        article.title,
        article.author.as_deref().unwrap_or("Unknown"),
        article.body
    );
    match output {
        Some(path) => std::fs::write(path, &text)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{text}"),
    }
    println!("\nParody premise: {}", source.idea().premise);
    Ok(())
}

fn cmd_sitemap(base_url: &str, site_dir: &Path) -> Result<()> {
    let path = rnn_core::write_sitemap(site_dir, base_url)
        .with_context(|| format!("Failed to build sitemap for {}", site_dir.display()))?;
    println!("{}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_deploy_flags_parse() {
        let cli = Cli::try_parse_from([
            "rnn",
            "--json",
            "deploy",
            "--num",
            "6",
            "--keep-local",
            "--auto",
            "--render-cmd",
            "python -m src.generate_site",
        ])
        .unwrap();
        assert!(cli.json);
        let Commands::Deploy(args) = cli.command else {
            panic!("expected deploy");
        };
        assert_eq!(args.num, 6);
        assert!(args.keep_local);
        assert!(args.auto);
        assert_eq!(args.branch, "main");
        assert_eq!(args.concurrency, 4);
        assert_eq!(args.repo, DEFAULT_REPO);
    }

    #[test]
    fn test_sitemap_takes_positional_args() {
        let cli = Cli::try_parse_from(["rnn", "sitemap", "https://example.com", "out/site"])
            .unwrap();
        match cli.command {
            Commands::Sitemap { base_url, site_dir } => {
                assert_eq!(base_url, "https://example.com");
                assert_eq!(site_dir, PathBuf::from("out/site"));
            }
            _ => panic!("expected sitemap"),
        }
    }
}
