//! CLI Tooling
//!
//! Command-line interface for panelkit: an interactive chat that turns agent
//! replies into registered components, plus commands to inspect and edit the
//! registry and the layout.

use crate::agent::{AgentClient, EntryKind, GatewayClient, ScriptedAgent, TranscriptEntry};
use crate::compiler::Compiler;
use crate::component::ComponentDefinition;
use crate::config::{ConfigLoader, PanelkitConfig};
use crate::dashboard::{Dashboard, Rendered};
use crate::error::ApiError;
use crate::layout::Geometry;
use crate::orchestrator::{ComponentHost, Orchestrator};
use crate::pipeline::{CompileOutcome, DefinitionPipeline};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Panelkit CLI - agent-authored dashboard components
#[derive(Parser)]
#[command(name = "panelkit")]
#[command(about = "Turn agent replies into compiled, persisted dashboard components")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Chat with the agent; compiled replies are registered and placed
    Chat {
        /// Model id (defaults to agent.model)
        #[arg(long)]
        model: Option<String>,
        /// Do not contact the agent; pasted source is compiled locally
        #[arg(long)]
        offline: bool,
    },
    /// Run a file of agent text through the extract/compile pipeline
    Compile {
        /// File holding the agent reply or bare component source
        file: PathBuf,
        /// Register the component and place one instance on success
        #[arg(long)]
        register: bool,
    },
    /// List registered components
    List {
        /// Only show this category
        #[arg(long)]
        category: Option<String>,
    },
    /// Show one component definition and its source
    Show { id: String },
    /// Remove a custom component and its layout instances
    Remove { id: String },
    /// Render a layout instance and print its tree as JSON
    Render {
        instance_id: String,
        /// Press the button whose text contains this label (repeatable)
        #[arg(long)]
        click: Vec<String>,
    },
    /// Layout commands (list, add, remove, move, set)
    Layout {
        #[command(subcommand)]
        command: LayoutCommands,
    },
    /// List the models the gateway offers
    Models,
    /// Show configuration, storage and gateway status
    Status {
        /// Skip the gateway health check
        #[arg(long)]
        offline: bool,
    },
}

#[derive(Subcommand)]
pub enum LayoutCommands {
    /// List layout instances
    List,
    /// Place a new instance of a registered component
    Add { component_id: String },
    /// Remove one instance
    Remove { instance_id: String },
    /// Move or resize an instance
    Move {
        instance_id: String,
        #[arg(long)]
        x: u32,
        #[arg(long)]
        y: u32,
        #[arg(long)]
        w: u32,
        #[arg(long)]
        h: u32,
    },
    /// Set one config value on an instance (JSON, or plain text)
    Set {
        instance_id: String,
        key: String,
        value: String,
    },
}

/// Command name for logging.
fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Chat { .. } => "chat",
        Commands::Compile { .. } => "compile",
        Commands::List { .. } => "list",
        Commands::Show { .. } => "show",
        Commands::Remove { .. } => "remove",
        Commands::Render { .. } => "render",
        Commands::Layout { .. } => "layout",
        Commands::Models => "models",
        Commands::Status { .. } => "status",
    }
}

/// CLI context: resolved configuration plus the opened dashboard.
pub struct CliContext {
    config: PanelkitConfig,
    config_path: Option<PathBuf>,
    dashboard: RefCell<Dashboard>,
}

impl CliContext {
    /// Load configuration and open the stored dashboard.
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = ConfigLoader::resolve(config_path.as_deref())?;
        let mut context = Self::with_config(config)?;
        context.config_path = config_path;
        Ok(context)
    }

    pub fn with_config(config: PanelkitConfig) -> Result<Self, ApiError> {
        let dashboard = Dashboard::open(&config)?;
        let report = dashboard.bootstrap_report();
        if !report.is_clean() {
            for dropped in &report.dropped {
                tracing::warn!("Dropped stored component {}: {}", dropped.id, dropped.reason);
            }
        }
        Ok(Self {
            config,
            config_path: None,
            dashboard: RefCell::new(dashboard),
        })
    }

    pub fn config(&self) -> &PanelkitConfig {
        &self.config
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        info!(command = command_name(command), "executing command");
        match command {
            Commands::Chat { model, offline } => self.handle_chat(model.as_deref(), *offline),
            Commands::Compile { file, register } => self.handle_compile(file, *register),
            Commands::List { category } => Ok(self.handle_list(category.as_deref())),
            Commands::Show { id } => self.handle_show(id),
            Commands::Remove { id } => {
                let removal = self.dashboard.borrow_mut().remove_component(id)?;
                Ok(format!(
                    "Removed component {} ({} layout instance(s))",
                    removal.event.id(),
                    removal.instances.len()
                ))
            }
            Commands::Render { instance_id, click } => self.handle_render(instance_id, click),
            Commands::Layout { command } => self.handle_layout(command),
            Commands::Models => Ok(self.handle_models()),
            Commands::Status { offline } => self.handle_status(*offline),
        }
    }

    fn runtime() -> Result<tokio::runtime::Runtime, ApiError> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to create runtime: {}", e)))
    }

    fn agent_client(&self, offline: bool) -> Result<Arc<dyn AgentClient>, ApiError> {
        if offline {
            return Ok(Arc::new(ScriptedAgent::unreachable()));
        }
        Ok(Arc::new(GatewayClient::new(&self.config.agent)?))
    }

    fn handle_chat(&self, model: Option<&str>, offline: bool) -> Result<String, ApiError> {
        use dialoguer::Input;

        let client = self.agent_client(offline)?;
        let model = model.unwrap_or(&self.config.agent.model).to_string();
        let pipeline = DefinitionPipeline::new(Compiler::new(self.config.compiler.clone()));
        let mut dashboard = self.dashboard.borrow_mut();
        let orchestrator = Orchestrator::new(client, pipeline, &mut *dashboard, model);
        let rt = Self::runtime()?;

        print_entries(orchestrator.transcript().entries());
        println!(
            "{}",
            "Commands: /model <id>, /models, /reset, /quit. Ctrl-C dismisses a pending request."
                .dimmed()
        );

        let mut installed = 0usize;
        loop {
            let line: String = Input::new()
                .with_prompt(format!("you ({})", orchestrator.model_id()))
                .allow_empty(true)
                .interact_text()
                .map_err(|e| ApiError::ConfigError(format!("Failed to get user input: {}", e)))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(command) = line.strip_prefix('/') {
                let mut parts = command.split_whitespace();
                match (parts.next(), parts.next()) {
                    (Some("quit") | Some("exit"), _) => break,
                    (Some("reset"), _) => {
                        let mark = orchestrator.transcript().len();
                        orchestrator.reset_conversation();
                        print_entries(orchestrator.transcript().since(mark));
                    }
                    (Some("models"), _) => println!("{}", self.handle_models()),
                    (Some("model"), Some(id)) => {
                        orchestrator.set_model(id);
                        println!("{}", format!("Model set to {}", id).cyan());
                    }
                    _ => println!("{}", format!("Unknown command: /{}", command).red()),
                }
                continue;
            }

            let mark = orchestrator.transcript().len();
            let report = rt.block_on(async {
                let submit = orchestrator.submit(line);
                tokio::pin!(submit);
                tokio::select! {
                    report = &mut submit => report,
                    _ = tokio::signal::ctrl_c() => {
                        orchestrator.dismiss();
                        println!("{}", "Dismissed; waiting for the pending call to return.".dimmed());
                        submit.await
                    }
                }
            })?;
            // The user's own line is already on screen.
            let transcript = orchestrator.transcript();
            for entry in transcript.since(mark).iter().filter(|e| e.kind != EntryKind::User) {
                println!("{}", format_entry(entry));
            }
            drop(transcript);
            if report.installation.is_some() {
                installed += 1;
            }
        }
        Ok(format!("Session ended; {} component(s) installed.", installed))
    }

    fn handle_compile(&self, file: &Path, register: bool) -> Result<String, ApiError> {
        let text = std::fs::read_to_string(file)?;
        let pipeline = DefinitionPipeline::new(Compiler::new(self.config.compiler.clone()));
        match pipeline.compile(&text) {
            CompileOutcome::Success {
                definition,
                component,
            } => {
                let mut output = format!(
                    "Compiled {} ({}) {}x{}",
                    definition.id, definition.name, definition.default_size.w, definition.default_size.h
                );
                if register {
                    let installation = self.dashboard.borrow_mut().install(definition, component)?;
                    output.push_str(&format!(
                        "\nRegistered{}; instance {}",
                        if installation.replaced { " (replaced)" } else { "" },
                        installation.instance_id
                    ));
                }
                Ok(output)
            }
            CompileOutcome::Failure { reason, .. } => {
                Err(ApiError::InvalidDefinition(reason.to_string()))
            }
        }
    }

    fn handle_list(&self, category: Option<&str>) -> String {
        let dashboard = self.dashboard.borrow();
        let registry = dashboard.registry();
        let definitions = match category {
            Some(category) => registry.list_by_category(category),
            None => registry.list_all(),
        };
        if definitions.is_empty() {
            return "No components registered.".to_string();
        }
        let mut table = Table::new();
        table.load_preset(comfy_table::presets::UTF8_FULL);
        table.set_header(vec!["", "ID", "Name", "Category", "Size", "Origin", "Instances"]);
        for d in definitions {
            let instances = dashboard.layout().instances_of(&d.id).count();
            table.add_row(vec![
                d.icon.clone(),
                d.id.clone(),
                d.name.clone(),
                d.category.clone(),
                format!("{}x{}", d.default_size.w, d.default_size.h),
                if d.is_builtin() { "builtin" } else { "custom" }.to_string(),
                instances.to_string(),
            ]);
        }
        table.to_string()
    }

    fn handle_show(&self, id: &str) -> Result<String, ApiError> {
        let dashboard = self.dashboard.borrow();
        let definition = dashboard
            .registry()
            .definition(id)
            .ok_or_else(|| ApiError::ComponentNotFound(id.to_string()))?;
        Ok(format_definition(definition))
    }

    fn handle_render(&self, instance_id: &str, clicks: &[String]) -> Result<String, ApiError> {
        match self.dashboard.borrow_mut().render_instance(instance_id, clicks)? {
            Rendered::Builtin(definition) => Ok(format!(
                "{} is a builtin component; it is drawn by the host surface.",
                definition.name
            )),
            Rendered::Tree(node) => Ok(serde_json::to_string_pretty(&node.to_json())?),
        }
    }

    fn handle_layout(&self, command: &LayoutCommands) -> Result<String, ApiError> {
        let mut dashboard = self.dashboard.borrow_mut();
        match command {
            LayoutCommands::List => {
                let items = dashboard.layout().items();
                if items.is_empty() {
                    return Ok("Layout is empty.".to_string());
                }
                let mut table = Table::new();
                table.load_preset(comfy_table::presets::UTF8_FULL);
                table.set_header(vec!["Instance", "Component", "x,y", "w x h", "Config"]);
                for item in items {
                    table.add_row(vec![
                        item.instance_id.clone(),
                        item.definition_id.clone(),
                        format!("{},{}", item.x, item.y),
                        format!("{}x{}", item.w, item.h),
                        Value::Object(item.config.clone()).to_string(),
                    ]);
                }
                Ok(table.to_string())
            }
            LayoutCommands::Add { component_id } => {
                let instance_id = dashboard.add_instance(component_id)?;
                Ok(format!("Placed {} as {}", component_id, instance_id))
            }
            LayoutCommands::Remove { instance_id } => {
                let item = dashboard.remove_instance(instance_id)?;
                Ok(format!("Removed instance {} of {}", item.instance_id, item.definition_id))
            }
            LayoutCommands::Move {
                instance_id,
                x,
                y,
                w,
                h,
            } => {
                dashboard.update_geometry(
                    instance_id,
                    Geometry {
                        x: *x,
                        y: *y,
                        w: *w,
                        h: *h,
                    },
                )?;
                Ok(format!("Moved {}", instance_id))
            }
            LayoutCommands::Set {
                instance_id,
                key,
                value,
            } => {
                let value = serde_json::from_str(value)
                    .unwrap_or_else(|_| Value::String(value.clone()));
                let mut patch = Map::new();
                patch.insert(key.clone(), value);
                dashboard.update_instance_config(instance_id, patch)?;
                Ok(format!("Updated {}.{}", instance_id, key))
            }
        }
    }

    fn handle_models(&self) -> String {
        let mut table = Table::new();
        table.load_preset(comfy_table::presets::UTF8_FULL);
        table.set_header(vec!["", "Model", "Label"]);
        for model in &self.config.agent.models {
            let current = if model.id == self.config.agent.model { "*" } else { "" };
            table.add_row(vec![current, model.id.as_str(), model.label.as_str()]);
        }
        table.to_string()
    }

    fn handle_status(&self, offline: bool) -> Result<String, ApiError> {
        let mut out = String::new();
        out.push_str(&format!("{}\n", section_heading("Configuration")));
        match &self.config_path {
            Some(path) => out.push_str(&format!("  Config file: {}\n", path.display())),
            None => out.push_str("  Config file: (global and environment only)\n"),
        }
        out.push_str(&format!(
            "  Data dir: {}\n\n",
            self.config.storage.resolve_data_dir()?.display()
        ));

        let dashboard = self.dashboard.borrow();
        let report = dashboard.bootstrap_report();
        out.push_str(&format!("{}\n", section_heading("Components")));
        out.push_str(&format!(
            "  Registered: {} ({} restored from storage)\n",
            dashboard.registry().len(),
            report.loaded.len()
        ));
        for dropped in &report.dropped {
            out.push_str(&format!(
                "  {} {}: {}\n",
                "dropped".yellow(),
                dropped.id,
                dropped.reason
            ));
        }
        if let Some(error) = &report.store_error {
            out.push_str(&format!("  {} {}\n", "store unreadable:".red(), error));
        }
        out.push_str(&format!("  Layout instances: {}\n\n", dashboard.layout().len()));

        out.push_str(&format!("{}\n", section_heading("Agent")));
        out.push_str(&format!(
            "  Endpoint: {}\n  Model: {} ({})\n",
            self.config.agent.normalized_endpoint(),
            self.config.agent.model,
            self.config.agent.model_label()
        ));
        if !offline {
            let client = self.agent_client(false)?;
            let rt = Self::runtime()?;
            let reachable = match rt.block_on(client.check_status()) {
                Ok(true) => "reachable".green().to_string(),
                Ok(false) => "unhealthy".yellow().to_string(),
                Err(e) => format!("{} ({})", "unreachable".red(), e),
            };
            out.push_str(&format!("  Gateway: {}\n", reachable));
        }
        Ok(out)
    }
}

/// Bold, underlined heading. Respects NO_COLOR and TTY.
fn section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn format_entry(entry: &TranscriptEntry) -> String {
    match entry.kind {
        EntryKind::User => format!("{} {}", "you:".bold(), entry.text),
        EntryKind::Agent => format!("{} {}", "agent:".bold().blue(), entry.text),
        EntryKind::Notice => format!("{}", entry.text.cyan()),
        EntryKind::Error => format!("{} {}", "error:".bold().red(), entry.text.red()),
    }
}

fn print_entries(entries: &[TranscriptEntry]) {
    for entry in entries {
        println!("{}", format_entry(entry));
    }
}

fn format_definition(definition: &ComponentDefinition) -> String {
    let mut out = format!(
        "{} {} ({})\n  Category: {}\n  Origin: {}\n  Default size: {}x{}\n  Min size: {}x{}\n",
        definition.icon,
        definition.name,
        definition.id,
        definition.category,
        if definition.is_builtin() { "builtin" } else { "custom" },
        definition.default_size.w,
        definition.default_size.h,
        definition.min_size.w,
        definition.min_size.h,
    );
    if !definition.description.is_empty() {
        out.push_str(&format!("  Description: {}\n", definition.description));
    }
    if !definition.config_schema.is_empty() {
        out.push_str("  Config:\n");
        for (key, field) in definition.config_schema.iter() {
            out.push_str(&format!(
                "    {} ({:?}) = {}  {}\n",
                key, field.field_type, field.default, field.label
            ));
        }
    }
    if !definition.source.is_empty() {
        out.push_str("\nSource:\n");
        out.push_str(&definition.source);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use tempfile::TempDir;

    const REPLY: &str = "```json\n{\"widget\": {\"id\": \"counter\", \"name\": \"Counter\", \"configSchema\": {\"start\": {\"type\": \"string\", \"default\": \"0\"}}}}\n```\n```jsx\nfunction Widget({ config, onConfigChange }) {\n  const [n, setN] = useState(Number(config.start));\n  return <button onClick={() => { setN(n + 1); onConfigChange({ start: String(n + 1) }); }}>{\"Count \" + n}</button>;\n}\n```";

    fn context() -> (TempDir, CliContext) {
        let temp = TempDir::new().unwrap();
        let config = PanelkitConfig {
            storage: StorageConfig {
                data_dir: Some(temp.path().to_path_buf()),
            },
            ..PanelkitConfig::default()
        };
        let context = CliContext::with_config(config).unwrap();
        (temp, context)
    }

    #[test]
    fn compile_register_render_and_remove() {
        let (temp, ctx) = context();
        let file = temp.path().join("reply.md");
        std::fs::write(&file, REPLY).unwrap();

        let out = ctx
            .execute(&Commands::Compile {
                file: file.clone(),
                register: true,
            })
            .unwrap();
        assert!(out.starts_with("Compiled counter (Counter)"));
        assert!(out.contains("Registered; instance "));

        let listing = ctx.execute(&Commands::List { category: None }).unwrap();
        assert!(listing.contains("counter"));
        assert!(listing.contains("custom"));

        let instance_id = ctx
            .dashboard
            .borrow()
            .layout()
            .instances_of("counter")
            .next()
            .unwrap()
            .instance_id
            .clone();
        let rendered = ctx
            .execute(&Commands::Render {
                instance_id: instance_id.clone(),
                click: vec!["Count".to_string()],
            })
            .unwrap();
        assert!(rendered.contains("Count 1"));
        assert_eq!(
            ctx.dashboard.borrow().layout().get(&instance_id).unwrap().config["start"],
            Value::String("1".into())
        );

        let removed = ctx.execute(&Commands::Remove { id: "counter".into() }).unwrap();
        assert_eq!(removed, "Removed component counter (1 layout instance(s))");
        assert!(ctx.dashboard.borrow().layout().is_empty());
    }

    #[test]
    fn compile_failure_reports_reason() {
        let (temp, ctx) = context();
        let file = temp.path().join("reply.md");
        std::fs::write(&file, "No code here, just chat.").unwrap();
        let err = ctx
            .execute(&Commands::Compile {
                file,
                register: false,
            })
            .unwrap_err();
        assert!(err.to_string().contains("No component definition found"));
    }

    #[test]
    fn builtins_are_listed_and_protected() {
        let (_temp, ctx) = context();
        let listing = ctx.execute(&Commands::List { category: None }).unwrap();
        assert!(listing.contains("builtin"));

        let builtin_id = ctx.dashboard.borrow().registry().list_all()[0].id.clone();
        let shown = ctx.execute(&Commands::Show { id: builtin_id.clone() }).unwrap();
        assert!(shown.contains("Origin: builtin"));
        let err = ctx.execute(&Commands::Remove { id: builtin_id }).unwrap_err();
        assert!(matches!(err, ApiError::ProtectedComponent(_)));
    }

    #[test]
    fn layout_commands_edit_instances() {
        let (_temp, ctx) = context();
        let builtin_id = ctx.dashboard.borrow().registry().list_all()[0].id.clone();
        let placed = ctx
            .execute(&Commands::Layout {
                command: LayoutCommands::Add {
                    component_id: builtin_id.clone(),
                },
            })
            .unwrap();
        let instance_id = placed.rsplit(' ').next().unwrap().to_string();

        ctx.execute(&Commands::Layout {
            command: LayoutCommands::Set {
                instance_id: instance_id.clone(),
                key: "title".into(),
                value: "Inbox".into(),
            },
        })
        .unwrap();
        ctx.execute(&Commands::Layout {
            command: LayoutCommands::Move {
                instance_id: instance_id.clone(),
                x: 2,
                y: 1,
                w: 6,
                h: 4,
            },
        })
        .unwrap();
        {
            let dashboard = ctx.dashboard.borrow();
            let item = dashboard.layout().get(&instance_id).unwrap();
            assert_eq!(item.config["title"], Value::String("Inbox".into()));
            assert_eq!((item.x, item.y, item.w, item.h), (2, 1, 6, 4));
        }

        let rendered = ctx
            .execute(&Commands::Render {
                instance_id: instance_id.clone(),
                click: Vec::new(),
            })
            .unwrap();
        assert!(rendered.contains("builtin component"));

        let listing = ctx
            .execute(&Commands::Layout {
                command: LayoutCommands::List,
            })
            .unwrap();
        assert!(listing.contains(&instance_id));

        ctx.execute(&Commands::Layout {
            command: LayoutCommands::Remove { instance_id },
        })
        .unwrap();
        assert!(ctx.dashboard.borrow().layout().is_empty());
    }

    #[test]
    fn models_marks_current() {
        let (_temp, ctx) = context();
        let out = ctx.execute(&Commands::Models).unwrap();
        assert!(out.contains(&ctx.config().agent.model));
        assert!(out.contains('*'));
    }

    #[test]
    fn offline_status_skips_gateway() {
        let (_temp, ctx) = context();
        let out = ctx.execute(&Commands::Status { offline: true }).unwrap();
        assert!(out.contains("Endpoint: http://localhost:3577"));
        assert!(!out.contains("Gateway:"));
    }
}
