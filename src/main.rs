// SPDX-License-Identifier: MIT

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;

use kinetic_graph::adk::model::{Model, OpenAiCompatibleModel};
use kinetic_graph::kinetic::agents::{complaint, plan, react, ComplaintAgent, PlanAgent, ReActAgent};
use kinetic_graph::kinetic::cli::run_chat_loop;
use kinetic_graph::kinetic::config::Settings;
use kinetic_graph::kinetic::mcp;
use kinetic_graph::kinetic::server::{self, AppState};
use kinetic_graph::kinetic::tools::default_registry;
use kinetic_graph::kinetic::workflow::checkpoint::InMemoryCheckpointer;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Optional YAML settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the model name
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Override the per-run step budget
    #[arg(long, global = true)]
    max_iterations: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Plan a goal, execute every task and summarize
    Plan {
        #[arg(short, long)]
        goal: String,

        /// Print progress after every step
        #[arg(long)]
        stream: bool,
    },
    /// Classify and route a customer complaint
    Complaint {
        #[arg(short, long)]
        title: String,

        #[arg(short, long)]
        description: String,
    },
    /// Chat with the tool-using assistant
    Chat {
        /// Conversation thread id
        #[arg(short, long, default_value = "1")]
        thread: String,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
    /// Print a workflow graph as a Mermaid diagram
    Graph {
        /// plan, complaint or react
        #[arg(short, long)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref()).context("loading settings")?;
    if let Some(model) = args.model {
        settings.model.model_name = model;
    }
    if let Some(limit) = args.max_iterations {
        settings.max_iterations = Some(limit);
    }
    log::info!(
        "Using model {} at {}",
        settings.model.model_name,
        settings.model.base_url
    );

    let model: Arc<dyn Model> = Arc::new(OpenAiCompatibleModel::new(settings.model.clone()));
    let config = settings.executor_config();

    match args.command {
        Commands::Plan { goal, stream } => {
            let agent = PlanAgent::new(model, config)?;
            if stream {
                let mut events = Box::pin(agent.stream(&goal));
                while let Some(event) = events.next().await {
                    println!("{}", serde_json::to_string(&event?)?);
                }
            } else {
                let state = agent.invoke(&goal).await?;
                println!("{}", state.get_str("final_res").unwrap_or_default());
            }
        }
        Commands::Complaint { title, description } => {
            let agent = ComplaintAgent::new(model, config)?;
            let outcome = agent.handle(&title, &description).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Chat { thread } => {
            let registry = default_registry(&settings.files_dir, &settings.search).await;
            let remote = mcp::attach_servers(&registry, &settings.mcp_servers).await;
            log::info!("Chat tools: {:?} ({} from MCP)", registry.names().await, remote);
            let agent = ReActAgent::new(
                model,
                registry,
                config,
                Arc::new(InMemoryCheckpointer::new()),
            )
            .await?;

            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            run_chat_loop(stdin, tokio::io::stdout(), |turn| {
                let agent = agent.clone();
                let thread = thread.clone();
                async move { agent.chat(&thread, &turn).await }
            })
            .await?;
        }
        Commands::Serve { port } => {
            if let Err(e) = tracing::subscriber::set_global_default(
                tracing_subscriber::fmt().finish(),
            ) {
                log::warn!("Request tracing disabled: {}", e);
            }
            let state = Arc::new(AppState {
                plan: PlanAgent::new(model.clone(), config.clone())?,
                complaint: ComplaintAgent::new(model, config)?,
            });
            server::serve(state, port).await?;
        }
        Commands::Graph { name } => {
            let graph = match name.as_str() {
                "plan" => plan::build_plan_graph(model, config)?,
                "complaint" => complaint::build_complaint_graph(model, config)?,
                "react" => {
                    let registry = default_registry(&settings.files_dir, &settings.search).await;
                    react::build_react_graph(
                        model,
                        registry,
                        react::DEFAULT_SYSTEM_PROMPT,
                        config,
                        None,
                    )
                    .await?
                }
                other => anyhow::bail!("unknown graph '{other}', expected plan, complaint or react"),
            };
            print!("{}", graph.to_mermaid());
        }
    }

    Ok(())
}
