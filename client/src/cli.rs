use anyhow::Result;
use clap::{Parser, Subcommand};
use client::{
    ApiClient, ClientConfig, EventSession, PollingController, ResearchSession, TaskBackend,
    TaskSession,
};
use common::{
    EventTask, EventWorkflow, PromptConfig, PromptOverrides, ResearchTask, ResearchWorkflow,
    StartEventRequest, StartResearchRequest, StatusChip, TaskOf, Workflow, WorkflowStatus,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI para seguir y revisar tareas de eventos e investigación")]
struct Cli {
    /// URL base del backend (pisa WIZARD_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    /// Intervalo de polling en milisegundos (pisa POLL_INTERVAL_MS)
    #[arg(long, global = true, value_name = "MS")]
    interval_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Workflow de eventos (anuncio, imágenes, videos)
    #[command(subcommand)]
    Event(EventCommand),
    /// Workflow de investigación (outline, artículo)
    #[command(subcommand)]
    Research(ResearchCommand),
}

#[derive(Subcommand)]
enum EventCommand {
    /// Crea un evento nuevo
    Start {
        #[arg(value_name = "TITULO")]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },
    /// Lista los eventos
    List,
    /// Consulta el estado de un evento
    Status {
        #[arg(value_name = "TASK_ID")]
        id: String,
    },
    /// Sigue un evento con auto-polling hasta que termine
    Watch {
        #[arg(value_name = "TASK_ID")]
        id: String,
    },
    /// Aprueba el anuncio (o acepta las imágenes)
    Accept {
        #[arg(value_name = "TASK_ID")]
        id: String,
        #[arg(long)]
        feedback: Option<String>,
    },
    /// Pide otra versión del anuncio
    Revise {
        #[arg(value_name = "TASK_ID")]
        id: String,
        #[arg(long)]
        feedback: String,
    },
    /// Feedback sobre las imágenes: aceptar y continuar, o regenerar
    Images {
        #[arg(value_name = "TASK_ID")]
        id: String,
        /// Índices de imágenes, separados por coma (ej: 0,2)
        #[arg(long, value_delimiter = ',')]
        select: Vec<usize>,
        #[arg(long)]
        feedback: Option<String>,
        /// Regenera las imágenes marcadas en vez de continuar
        #[arg(long)]
        regenerate: bool,
    },
    /// Genera los videos a partir de los prompts
    Videos {
        #[arg(value_name = "TASK_ID")]
        id: String,
    },
    /// Muestra los prompts de sistema del evento
    Prompts {
        #[arg(value_name = "TASK_ID")]
        id: String,
    },
    /// Actualiza los prompts de sistema del evento
    SetPrompts {
        #[arg(value_name = "TASK_ID")]
        id: String,
        #[arg(long)]
        announcement: Option<String>,
        #[arg(long)]
        image: Option<String>,
        #[arg(long)]
        video: Option<String>,
    },
}

#[derive(Subcommand)]
enum ResearchCommand {
    /// Crea una investigación nueva
    Start {
        #[arg(value_name = "TEMA")]
        topic: String,
        #[arg(long)]
        instructions: Option<String>,
    },
    /// Lista las investigaciones
    List,
    /// Consulta el estado de una investigación
    Status {
        #[arg(value_name = "TASK_ID")]
        id: String,
    },
    /// Sigue una investigación con auto-polling hasta que termine
    Watch {
        #[arg(value_name = "TASK_ID")]
        id: String,
    },
    /// Aprueba el outline
    Accept {
        #[arg(value_name = "TASK_ID")]
        id: String,
        #[arg(long)]
        feedback: Option<String>,
    },
    /// Rechaza el outline (requiere feedback)
    Reject {
        #[arg(value_name = "TASK_ID")]
        id: String,
        #[arg(long)]
        feedback: String,
    },
    /// Regenera el outline (también después de editar prompts)
    Regenerate {
        #[arg(value_name = "TASK_ID")]
        id: String,
    },
    /// Muestra los prompts de la investigación
    Prompts {
        #[arg(value_name = "TASK_ID")]
        id: String,
    },
    /// Actualiza los prompts de la investigación
    SetPrompts {
        #[arg(value_name = "TASK_ID")]
        id: String,
        #[arg(long)]
        research: Option<String>,
        #[arg(long)]
        outline: Option<String>,
        #[arg(long)]
        article: Option<String>,
    },
    /// Muestra la URL del PDF del artículo
    Pdf {
        #[arg(value_name = "TASK_ID")]
        id: String,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(url) = cli.api_url {
        config = config.with_api_url(url);
    }
    if let Some(ms) = cli.interval_ms {
        config = config.with_poll_interval(Duration::from_millis(ms));
    }
    let api = Arc::new(ApiClient::new(&config)?);

    match cli.command {
        Commands::Event(cmd) => {
            let poller = PollingController::new(api.clone(), config.poll_interval);
            run_event(&api, poller, cmd).await
        }
        Commands::Research(cmd) => {
            let poller = PollingController::new(api.clone(), config.poll_interval);
            run_research(&api, poller, cmd).await
        }
    }
}

async fn run_event(
    api: &ApiClient,
    poller: PollingController<EventWorkflow, ApiClient>,
    cmd: EventCommand,
) -> Result<()> {
    match cmd {
        EventCommand::Start {
            title,
            description,
            date,
            location,
        } => {
            let req = StartEventRequest {
                title,
                description,
                date,
                location,
            };
            let created = api.start_event(&req).await?;
            println!("Evento creado:");
            println!("  id: {}", created.task_id);
        }

        EventCommand::List => {
            let tasks = api.list_events().await?;
            if tasks.is_empty() {
                println!("No hay eventos.");
            } else {
                for task in tasks {
                    print_row::<EventWorkflow>(&task);
                }
            }
        }

        EventCommand::Status { id } => {
            let mut session = open(poller, id).await?;
            print_event(&mut session);
        }

        EventCommand::Watch { id } => {
            watch(EventSession::new(poller, id), print_event).await?;
        }

        EventCommand::Accept { id, feedback } => {
            let mut session = open(poller, id).await?;
            session.set_feedback(feedback);
            session.accept().await?;
            print_event(&mut session);
        }

        EventCommand::Revise { id, feedback } => {
            let mut session = open(poller, id).await?;
            session.set_feedback(Some(feedback));
            session.reject().await?;
            print_event(&mut session);
        }

        EventCommand::Images {
            id,
            select,
            feedback,
            regenerate,
        } => {
            let mut session = open(poller, id).await?;
            for index in select {
                session.toggle_image(index);
            }
            session.set_feedback(feedback);
            if regenerate {
                session.regenerate().await?;
            } else {
                session.accept().await?;
            }
            print_event(&mut session);
        }

        EventCommand::Videos { id } => {
            let mut session = open(poller, id).await?;
            session.generate_next().await?;
            print_event(&mut session);
        }

        EventCommand::Prompts { id } => {
            let prompts = api.get_event_prompts(&id).await?;
            println!("Prompts del evento {}:", id);
            print_prompt("announcement", prompts.announcement.as_deref());
            print_prompt("image", prompts.image.as_deref());
            print_prompt("video", prompts.video.as_deref());
        }

        EventCommand::SetPrompts {
            id,
            announcement,
            image,
            video,
        } => {
            let mut session = open(poller, id).await?;
            session
                .update_prompts(PromptOverrides {
                    announcement,
                    image,
                    video,
                })
                .await?;
            println!("Prompts actualizados.");
            print_event(&mut session);
        }
    }

    Ok(())
}

async fn run_research(
    api: &ApiClient,
    poller: PollingController<ResearchWorkflow, ApiClient>,
    cmd: ResearchCommand,
) -> Result<()> {
    match cmd {
        ResearchCommand::Start {
            topic,
            instructions,
        } => {
            let created = api
                .start_research(&StartResearchRequest {
                    topic,
                    instructions,
                })
                .await?;
            println!("Investigación creada:");
            println!("  id: {}", created.task_id);
        }

        ResearchCommand::List => {
            let tasks = api.list_research().await?;
            if tasks.is_empty() {
                println!("No hay investigaciones.");
            } else {
                for task in tasks {
                    print_row::<ResearchWorkflow>(&task);
                }
            }
        }

        ResearchCommand::Status { id } => {
            let mut session = open(poller, id).await?;
            print_research(&mut session);
        }

        ResearchCommand::Watch { id } => {
            watch(ResearchSession::new(poller, id), print_research).await?;
        }

        ResearchCommand::Accept { id, feedback } => {
            let mut session = open(poller, id).await?;
            session.set_feedback(feedback);
            session.accept().await?;
            print_research(&mut session);
        }

        ResearchCommand::Reject { id, feedback } => {
            let mut session = open(poller, id).await?;
            session.set_feedback(Some(feedback));
            session.reject().await?;
            print_research(&mut session);
        }

        ResearchCommand::Regenerate { id } => {
            let mut session = open(poller, id).await?;
            // después de editar prompts la regeneración es la "siguiente etapa"
            if session.actions().generate_next {
                session.generate_next().await?;
            } else {
                session.regenerate().await?;
            }
            print_research(&mut session);
        }

        ResearchCommand::Prompts { id } => {
            let prompts = api.get_user_prompts(&id).await?;
            println!("Prompts de la investigación {}:", id);
            print_prompt("research", prompts.research.as_deref());
            print_prompt("outline", prompts.outline.as_deref());
            print_prompt("article", prompts.article.as_deref());
        }

        ResearchCommand::SetPrompts {
            id,
            research,
            outline,
            article,
        } => {
            let mut session = open(poller, id).await?;
            session
                .update_prompts(PromptConfig {
                    research,
                    outline,
                    article,
                })
                .await?;
            println!("Prompts actualizados.");
            print_research(&mut session);
        }

        ResearchCommand::Pdf { id } => {
            let mut session = open(poller, id).await?;
            let pdf = session.pdf().await?;
            println!("PDF de {}:", session.task_id());
            println!("  url    : {}", pdf.pdf_url);
            println!("  formato: {}", pdf.format);
        }
    }

    Ok(())
}

/// Abre una sesión y trae la tarea por primera vez.
async fn open<W: Workflow>(
    poller: PollingController<W, ApiClient>,
    id: String,
) -> Result<TaskSession<W>>
where
    ApiClient: TaskBackend<W>,
{
    let mut session = TaskSession::new(poller, id);
    session.refresh().await?;
    Ok(session)
}

/// Auto-polling hasta status terminal, imprimiendo cada cambio de status.
async fn watch<W: Workflow>(
    mut session: TaskSession<W>,
    print: fn(&mut TaskSession<W>),
) -> Result<()>
where
    ApiClient: TaskBackend<W>,
{
    session.refresh().await?;
    print(&mut session);

    session.set_auto_polling(true);
    if !session.is_polling() {
        return Ok(());
    }
    println!(
        "  (auto-polling cada {:?}, Ctrl-C para salir)",
        session.poller().interval()
    );

    let mut last_status = session.task().map(|t| t.status);
    loop {
        match session.next_update().await {
            Ok(Some(tab)) => println!("  -> pestaña {}", tab),
            Ok(None) => {}
            Err(RecvError::Lagged(n)) => {
                warn!("se perdieron {} actualizaciones", n);
                continue;
            }
            Err(RecvError::Closed) => break,
        }

        let Some(status) = session.task().map(|t| t.status) else {
            continue;
        };
        if last_status.as_ref() != Some(&status) {
            print(&mut session);
            last_status = Some(status.clone());
        }
        if status.is_terminal() {
            break;
        }
    }

    Ok(())
}

/* ---------------- salida ---------------- */

fn paint(chip: StatusChip) -> String {
    format!("{}{}\x1b[0m", chip.color.ansi(), chip)
}

fn print_row<W: Workflow>(task: &TaskOf<W>) {
    let updated = task
        .updated_at_utc()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  {:<38} {:<24} {}",
        task.task_id,
        task.status.chip().label,
        updated
    );
}

fn print_header<W: Workflow>(session: &mut TaskSession<W>) -> Option<TaskOf<W>>
where
    ApiClient: TaskBackend<W>,
{
    let Some(task) = session.task() else {
        println!("(tarea sin cargar)");
        return None;
    };

    println!("Tarea {} ({}):", task.task_id, W::KIND);
    println!("  estado  : {} {}", paint(session.chip()), task.status);
    if let Some(pct) = task.progress_pct() {
        println!("  progreso: {:.1}%", pct);
    }
    if let Some(ref step) = task.current_step {
        println!("  paso    : {}", step);
    }
    if let Some(ref err) = task.error {
        println!("  error   : {}", err);
    }
    if let Some(created) = task.created_at_utc() {
        println!("  creada  : {}", created);
    }
    if let Some(updated) = task.updated_at_utc() {
        println!("  updated : {}", updated);
    }
    println!("  pestaña : {}", session.tab());

    let actions = session.actions();
    let enabled: Vec<&str> = actions.enabled().iter().map(|a| a.as_str()).collect();
    if enabled.is_empty() {
        println!("  acciones: (ninguna)");
    } else {
        println!("  acciones: {}", enabled.join(", "));
    }
    if actions.next_stage_required {
        println!("  ! hay que regenerar antes de continuar");
    }

    Some(task)
}

fn print_event(session: &mut EventSession) {
    let Some(task): Option<EventTask> = print_header(session) else {
        return;
    };
    let p = &task.payload;

    if let Some(ref text) = p.announcement {
        println!("  anuncio : {}", preview(text, 120));
    }
    if !p.preview_images.is_empty() {
        println!("  imágenes:");
        for (i, url) in p.preview_images.iter().enumerate() {
            let mark = if session.context().selected_images.contains(&i) { "*" } else { " " };
            println!("   {}[{}] {}", mark, i, url);
        }
    }
    if !p.video_prompts.is_empty() {
        println!("  prompts de video:");
        for (i, prompt) in p.video_prompts.iter().enumerate() {
            println!("    [{}] {}", i, preview(prompt, 100));
        }
    }
    if !p.video_urls.is_empty() {
        println!("  videos:");
        for url in &p.video_urls {
            println!("    - {}", url);
        }
    }
}

fn print_research(session: &mut ResearchSession) {
    let Some(task): Option<ResearchTask> = print_header(session) else {
        return;
    };
    let p = &task.payload;

    if let Some(ref topic) = p.topic {
        println!("  tema    : {}", topic);
    }
    if let Some(ref outline) = p.outline {
        println!("  outline :");
        for line in outline.lines().take(12) {
            println!("    {}", line);
        }
    }
    if let Some(ref article) = p.article {
        println!("  artículo: {} caracteres", article.chars().count());
    }
    if let Some(ref feedback) = p.feedback {
        println!("  feedback: {}", feedback);
    }
}

fn print_prompt(name: &str, value: Option<&str>) {
    match value {
        Some(v) => println!("  {:<12}: {}", name, preview(v, 100)),
        None => println!("  {:<12}: (default)", name),
    }
}

fn preview(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{}…", cut)
    }
}
