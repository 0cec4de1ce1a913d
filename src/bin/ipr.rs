use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use ipr::engine::{EngineScene, ProceduralEngineOpts, SharedEngineScene};
use ipr::scene::{HostScene, ProceduralTranslator, SceneEditor};
use ipr::{
    CompletionCriteria, NodeId, PngDisplay, ProceduralEngine, RenderMode, RenderRegion,
    RenderSession, RenderSessionOpts, SessionState, SessionStats, ThreadingMode, TileSize,
};

#[derive(Parser, Debug)]
#[command(name = "ipr", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Batch-render the procedural demo scene to a PNG.
    Render(RenderArgs),
    /// Run a scripted interactive session (edits, pause, resize, stop) and print a JSON report.
    Interactive(InteractiveArgs),
}

#[derive(Parser, Debug)]
struct SceneArgs {
    /// Frame width in pixels.
    #[arg(long, default_value_t = 320)]
    width: u32,

    /// Frame height in pixels.
    #[arg(long, default_value_t = 240)]
    height: u32,

    /// Number of demo discs.
    #[arg(long, default_value_t = 12)]
    nodes: usize,

    /// Demo scene seed.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Session options JSON; command-line flags override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Square tile edge; renders each iteration tile by tile.
    #[arg(long)]
    tile: Option<u32>,

    /// Drive the worker from the main thread instead of a dedicated thread.
    #[arg(long, default_value_t = false)]
    inline: bool,

    /// Give up after this many seconds.
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Iterations to accumulate.
    #[arg(long, default_value_t = 16)]
    iterations: u32,

    /// Run the engine denoiser on the final buffer.
    #[arg(long, default_value_t = false)]
    denoise: bool,

    /// Run the engine tonemapper.
    #[arg(long, default_value_t = false)]
    tonemap: bool,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct InteractiveArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Iterations per convergence.
    #[arg(long, default_value_t = 4)]
    iterations: u32,

    /// Number of scripted node edits.
    #[arg(long, default_value_t = 3)]
    edits: usize,

    /// Optional PNG of the last delivered frame.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(serde::Serialize)]
struct InteractiveReport {
    edits: usize,
    noop_notifications_skipped: bool,
    pause_held: bool,
    resized_to: RenderRegion,
    final_state: SessionState,
    stats: SessionStats,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ipr=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Interactive(args) => cmd_interactive(args),
    }
}

struct Demo {
    session: RenderSession<PngDisplay>,
    editor: SceneEditor,
    nodes: Vec<NodeId>,
    region: RenderRegion,
    timeout: Duration,
}

fn load_opts(args: &SceneArgs, mode: RenderMode) -> anyhow::Result<RenderSessionOpts> {
    let mut opts = match &args.config {
        Some(path) => RenderSessionOpts::from_json_path(path)
            .with_context(|| format!("load session options '{}'", path.display()))?,
        None => RenderSessionOpts::default(),
    };
    opts.mode = mode;
    if let Some(edge) = args.tile {
        opts.tile_size = Some(TileSize::square(edge)?);
    }
    if args.inline {
        opts.threading = ThreadingMode::Inline;
    }
    Ok(opts)
}

fn build_demo(args: &SceneArgs, opts: RenderSessionOpts, out: PathBuf) -> anyhow::Result<Demo> {
    let region = RenderRegion::full(args.width, args.height)?;
    let engine_scene: SharedEngineScene = EngineScene::new([0.18, 0.2, 0.24]).shared();
    let host = HostScene::new().shared();
    let engine = ProceduralEngine::new(engine_scene.clone(), ProceduralEngineOpts::default());
    let translator = ProceduralTranslator::new(host.clone(), engine_scene);

    tracing::info!(
        %region,
        mode = ?opts.mode,
        tile = ?opts.tile_size,
        threading = ?opts.threading,
        "session configured"
    );
    let session = RenderSession::new(engine, translator, PngDisplay::new(out), opts)?;
    let editor = SceneEditor::new(host, session.notifier());
    let nodes = editor.populate_demo(args.nodes, args.seed);
    Ok(Demo {
        session,
        editor,
        nodes,
        region,
        timeout: Duration::from_secs(args.timeout_secs),
    })
}

fn fault(session: &RenderSession<PngDisplay>) -> anyhow::Error {
    match session.last_error() {
        Some(e) => anyhow::anyhow!("render failed: {e}"),
        None => anyhow::anyhow!("render failed"),
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut opts = load_opts(&args.scene, RenderMode::Batch)?;
    opts.composite.denoise |= args.denoise;
    opts.composite.tonemap |= args.tonemap;
    let Demo {
        mut session,
        region,
        timeout,
        ..
    } = build_demo(&args.scene, opts, args.out.clone())?;

    session.start(region, CompletionCriteria::iterations(args.iterations))?;
    match session.wait_until_idle(timeout)? {
        SessionState::Idle => {}
        SessionState::Error => {
            let err = fault(&session);
            session.stop()?;
            return Err(err);
        }
        state => {
            session.stop()?;
            bail!("render still {state} after {}s", timeout.as_secs());
        }
    }

    session
        .display()
        .finish()
        .with_context(|| format!("write png '{}'", args.out.display()))?;
    let stats = session.stats();
    tracing::info!(
        iterations = stats.iterations,
        frames = stats.frames_delivered,
        "render done"
    );
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn converge(demo: &mut Demo, what: &str) -> anyhow::Result<()> {
    let ok = demo.session.pump_until(demo.timeout, |s| {
        s.progress() >= 100 && s.stats().frames_delivered > 0
    })?;
    if demo.session.is_error() {
        return Err(fault(&demo.session));
    }
    if !ok {
        bail!("{what}: no convergence within {}s", demo.timeout.as_secs());
    }
    Ok(())
}

fn cmd_interactive(args: InteractiveArgs) -> anyhow::Result<()> {
    let opts = load_opts(&args.scene, RenderMode::Interactive)?;
    let out = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from("ipr_interactive.png"));
    let mut demo = build_demo(&args.scene, opts, out)?;

    demo.session
        .start(demo.region, CompletionCriteria::iterations(args.iterations))?;
    converge(&mut demo, "initial render")?;

    // Discs follow the camera and the key light in demo order.
    let discs: Vec<NodeId> = demo.nodes.iter().skip(2).copied().collect();
    for i in 0..args.edits {
        let Some(&node) = discs.get(i % discs.len().max(1)) else {
            break;
        };
        let before = demo.session.stats().resync.resynced;
        demo.editor.update(node, |n| {
            if let ipr::scene::NodeKind::Mesh { center, .. } = &mut n.kind {
                center[0] = (center[0] + 0.1).fract();
            }
        });
        let ok = demo
            .session
            .pump_until(demo.timeout, |s| s.stats().resync.resynced > before)?;
        if !ok {
            bail!("edit {i} was not resynced");
        }
        converge(&mut demo, "edit")?;
        tracing::info!(%node, "edit applied");
    }

    let resynced = demo.session.stats().resync.resynced;
    if let Some(&node) = discs.first() {
        demo.editor.touch(node);
    }
    let unchanged_before = demo.session.stats().resync.unchanged;
    demo.session
        .pump_until(demo.timeout, |s| s.stats().resync.unchanged > unchanged_before)?;
    let noop_notifications_skipped = discs.is_empty()
        || (demo.session.stats().resync.resynced == resynced
            && demo.session.stats().resync.unchanged > unchanged_before);

    demo.session.pause(true)?;
    let calls = demo.session.stats().render_calls;
    demo.session.pump_until(Duration::from_millis(50), |_| false)?;
    let pause_held = demo.session.stats().render_calls == calls;

    let resized_to = RenderRegion::full(
        (args.scene.width / 2).max(1),
        (args.scene.height / 2).max(1),
    )?;
    demo.session.resize(resized_to)?;
    demo.session.pause(false)?;
    converge(&mut demo, "resize")?;

    demo.session.stop()?;
    if args.out.is_some() {
        demo.session.display().finish()?;
    }

    let report = InteractiveReport {
        edits: args.edits,
        noop_notifications_skipped,
        pause_held,
        resized_to,
        final_state: demo.session.state(),
        stats: demo.session.stats(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
