use clap::Parser;
use serversmith::config::{Command, PropsAction};
use serversmith::core::backup::backup_instance;
use serversmith::core::catalog::distribution_for;
use serversmith::core::files::list_instance_files;
use serversmith::core::icon::save_server_icon;
use serversmith::core::process::{is_recorded_running, STOPPED_MESSAGE};
use serversmith::core::properties::{motd_to_section_codes, validate_property, ServerSettings};
use serversmith::core::ProvisionEvent;
use serversmith::utils::monitor::{self, SystemMonitor};
use serversmith::utils::logger;
use serversmith::utils::validation::{validate_memory, Validate};
use serversmith::{
    AppPaths, Cli, CreateRequest, Downloader, InstanceManager, LocalStorage, ProcessSupervisor,
    PropertiesFile, Provisioner, ServerInstance, ServerSmithError, ServerType, Settings,
};
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;

type Manager = InstanceManager<LocalStorage>;

struct App {
    paths: AppPaths,
    settings: Settings,
    manager: Manager,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("CLI args: {:?}", cli);

    let result = match load_app(&cli).await {
        Ok(mut app) => run(&mut app, cli.command).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        let Some(error) = e.downcast_ref::<ServerSmithError>() else {
            tracing::error!("❌ {:#}", e);
            eprintln!("❌ {:#}", e);
            std::process::exit(1);
        };

        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            error,
            error.category(),
            error.severity()
        );
        eprintln!("❌ {}", error.user_friendly_message());
        eprintln!("💡 Suggestion: {}", error.recovery_suggestion());

        std::process::exit(error.severity().exit_code());
    }

    Ok(())
}

async fn load_app(cli: &Cli) -> anyhow::Result<App> {
    let paths = AppPaths::from_env()?;
    let settings_file = cli
        .settings
        .clone()
        .unwrap_or_else(|| paths.settings_file());

    let settings = Settings::load(&settings_file)?;
    settings.validate()?;
    tracing::debug!("Settings loaded from {}", settings_file.display());

    let paths = paths.with_cache_dir(settings.cache_dir_override());
    let manager = InstanceManager::load(LocalStorage::new(), paths.registry_file()).await;

    Ok(App {
        paths,
        settings,
        manager,
    })
}

async fn run(app: &mut App, command: Command) -> anyhow::Result<()> {
    match command {
        Command::List { filter } => list(app, filter.as_deref().unwrap_or_default()),
        Command::Versions { server_type } => versions(app, server_type).await,
        Command::Create {
            name,
            server_type,
            version,
            dir,
            accept_eula,
            jar,
            min_memory,
            max_memory,
        } => {
            let request = CreateRequest {
                name,
                server_type,
                version: version.unwrap_or_default(),
                base_dir: dir.unwrap_or_else(|| app.manager.default_base_directory()),
                eula_accepted: accept_eula,
                custom_jar: jar,
                min_memory: min_memory.unwrap_or(app.settings.java.min_memory_mb),
                max_memory: max_memory.unwrap_or(app.settings.java.max_memory_mb),
            };
            create(app, request).await
        }
        Command::Import { dir } => {
            let instance = app.manager.import_instance(&dir).await?;
            println!("✅ Imported {} ({})", instance.name, instance.location.display());
            Ok(())
        }
        Command::Remove { instance } => {
            let instance = find(&app.manager, &instance)?;
            app.manager.remove_instance(&instance.location).await?;
            println!("✅ Removed {} (files kept at {})", instance.name, instance.location.display());
            Ok(())
        }
        Command::Delete { instance, yes } => {
            let instance = find(&app.manager, &instance)?;
            if !yes {
                anyhow::bail!(
                    "Refusing to delete {} without --yes",
                    instance.location.display()
                );
            }
            if is_recorded_running(&instance) {
                return Err(ServerSmithError::AlreadyRunning(instance.location).into());
            }
            app.manager.delete_instance(&instance.location).await?;
            println!("🗑️  Deleted {}", instance.name);
            Ok(())
        }
        Command::Start { instance, monitor } => start(app, &instance, monitor).await,
        Command::Props { instance, action } => props(app, &instance, action),
        Command::Memory { instance, min, max } => {
            validate_memory(min, max)?;
            warn_if_exceeds_system_memory(max);

            let mut instance = find(&app.manager, &instance)?;
            instance.min_memory = min;
            instance.max_memory = max;
            app.manager.save_instance_metadata(&instance).await?;
            println!("✅ {} will start with -Xms{}M -Xmx{}M", instance.name, min, max);
            Ok(())
        }
        Command::Files { instance } => {
            let instance = find(&app.manager, &instance)?;
            for entry in list_instance_files(&instance.location).await? {
                if entry.is_dir {
                    println!("📁 {}/", entry.name);
                } else {
                    println!("📄 {:<40} {:>10}", entry.name, format_size(entry.size));
                }
            }
            Ok(())
        }
        Command::Backup { instance } => {
            let instance = find(&app.manager, &instance)?;
            let archive = backup_instance(&instance, &app.paths.backups_dir()).await?;
            println!("📦 Backup written to {}", archive.display());
            Ok(())
        }
        Command::Icon { instance, image } => {
            let instance = find(&app.manager, &instance)?;
            let icon = save_server_icon(&image, &instance.location).await?;
            println!("🖼️  Icon written to {}", icon.display());
            Ok(())
        }
        Command::DefaultDir { path } => {
            if let Some(path) = path {
                app.manager.set_default_base_directory(&path).await?;
            }
            println!("{}", app.manager.default_base_directory().display());
            Ok(())
        }
    }
}

fn find(manager: &Manager, name_or_path: &str) -> anyhow::Result<ServerInstance> {
    manager
        .find(name_or_path)
        .cloned()
        .ok_or_else(|| ServerSmithError::InstanceNotFound(name_or_path.to_string()).into())
}

fn list(app: &App, filter: &str) -> anyhow::Result<()> {
    let instances = app.manager.filter(filter);
    if instances.is_empty() {
        println!("No servers found. Create one with `serversmith create`.");
        return Ok(());
    }

    for instance in instances {
        println!(
            "{:<24} {:<9} {:<14} {}  (last opened {})",
            instance.name,
            instance.server_type,
            instance.version,
            instance.location.display(),
            instance.last_opened.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

async fn versions(app: &App, server_type: ServerType) -> anyhow::Result<()> {
    let client = app.settings.http_client()?;
    let distribution = distribution_for(server_type, &app.settings.sources, client).ok_or_else(
        || ServerSmithError::InvalidConfigValueError {
            field: "type".to_string(),
            value: server_type.to_string(),
            reason: "Custom servers have no version catalog".to_string(),
        },
    )?;

    for version in distribution.fetch_versions().await? {
        println!("{}", version);
    }
    Ok(())
}

async fn create(app: &mut App, request: CreateRequest) -> anyhow::Result<()> {
    warn_if_exceeds_system_memory(request.max_memory);

    let client = app.settings.http_client()?;
    let downloader = Downloader::new(client.clone(), app.paths.cache_dir.clone());
    let provisioner = Provisioner::new(
        client,
        downloader,
        app.settings.sources.clone(),
        app.settings.java.binary.clone(),
    );

    let instance = provisioner
        .create(&mut app.manager, &request, print_event)
        .await?;

    println!();
    println!("✅ Created {} at {}", instance.name, instance.location.display());
    println!("   Start it with: serversmith start \"{}\"", instance.name);
    Ok(())
}

fn print_event(event: ProvisionEvent) {
    match event {
        ProvisionEvent::Status(status) => println!("\n▶ {}", status),
        ProvisionEvent::Log(line) => println!("  {}", line),
        ProvisionEvent::Progress(p) => {
            print!("\r  [{:<30}] {:>3.0}%", "#".repeat((p * 30.0) as usize), p * 100.0);
            let _ = std::io::stdout().flush();
        }
    }
}

async fn start(app: &mut App, name: &str, monitor_enabled: bool) -> anyhow::Result<()> {
    let mut instance = find(&app.manager, name)?;
    warn_if_exceeds_system_memory(instance.max_memory);

    instance.touch();
    app.manager.save_instance_metadata(&instance).await?;

    let supervisor = ProcessSupervisor::new(app.settings.java.binary.clone());
    let mut session = supervisor.start(&instance)?;
    let location = instance.location.clone();
    println!(
        "🚀 Started {} (pid {}). Type commands below; Ctrl-C stops the server.",
        instance.name, session.pid
    );

    let mut console = spawn_console_reader();
    let mut console_open = true;
    let monitor = SystemMonitor::new(monitor_enabled);
    let mut stats = tokio::time::interval(Duration::from_secs(30));
    let mut stop_requested = false;
    let mut ctrl_c_available = true;

    loop {
        tokio::select! {
            line = session.next_line() => match line {
                Some(line) => println!("{}", line),
                None => break,
            },
            input = console.recv(), if console_open => match input {
                Some(command) if !command.trim().is_empty() => {
                    if let Err(e) = supervisor.send_command(&location, command.trim()) {
                        tracing::warn!("Could not send command: {}", e);
                    }
                }
                Some(_) => {}
                None => console_open = false,
            },
            signal = tokio::signal::ctrl_c(), if ctrl_c_available => {
                if let Err(e) = signal {
                    tracing::error!("Failed to listen for Ctrl-C: {}", e);
                    ctrl_c_available = false;
                    continue;
                }
                // Errors here mean the server is already on its way out; the
                // loop keeps draining output until it is gone.
                let result = if stop_requested {
                    println!("⚠️  Killing server");
                    supervisor.kill(&location)
                } else {
                    stop_requested = true;
                    println!("⏹️  Stopping server (Ctrl-C again to kill)");
                    supervisor.stop(&location)
                };
                if let Err(e) = result {
                    tracing::warn!("{}", e);
                }
            },
            _ = stats.tick(), if monitor.is_enabled() => {
                monitor.log_stats(&instance.name, session.pid);
            },
        }
    }

    let code = session.exit.await.ok().flatten();
    tracing::debug!("{} ({:?})", STOPPED_MESSAGE, code);
    match code {
        Some(0) => Ok(()),
        Some(code) => Err(ServerSmithError::process(format!("Server exited with code {}", code)).into()),
        None if stop_requested => Ok(()),
        None => Err(ServerSmithError::process("Server was terminated by a signal").into()),
    }
}

/// Reads console input on a plain thread; tokio's stdin would keep the
/// runtime alive after the server exits.
fn spawn_console_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn props(app: &App, name: &str, action: PropsAction) -> anyhow::Result<()> {
    let instance = find(&app.manager, name)?;
    let mut file = PropertiesFile::open(instance.properties_path())?;

    match action {
        PropsAction::List => {
            if file.entries().is_empty() {
                println!(
                    "{} has no server.properties yet; it is written on first start.",
                    instance.name
                );
            }
            for (key, value) in file.entries() {
                println!("{}={}", key, value);
            }
        }
        PropsAction::Show => print_settings(&ServerSettings::read(&file)),
        PropsAction::Get { key } => match file.get(&key) {
            Some(value) => println!("{}", value),
            None => anyhow::bail!("{} is not set in {}", key, file.path().display()),
        },
        PropsAction::Set { key, value } => {
            validate_property(&key, &value)?;
            let value = if key == "motd" {
                motd_to_section_codes(&value)
            } else {
                value
            };
            file.set(&key, &value);
            file.save()?;
            println!("✅ {}={}", key, value);
            if is_recorded_running(&instance) {
                println!("ℹ️  Restart the server for the change to take effect.");
            }
        }
    }
    Ok(())
}

fn print_settings(settings: &ServerSettings) {
    let unset = || "-".to_string();
    println!("MOTD:        {}", settings.motd);
    println!(
        "Port:        {}",
        settings.server_port.map(|p| p.to_string()).unwrap_or_else(unset)
    );
    println!(
        "Max players: {}",
        settings.max_players.map(|p| p.to_string()).unwrap_or_else(unset)
    );
    println!(
        "Difficulty:  {}",
        settings.difficulty.map(|d| d.as_str().to_string()).unwrap_or_else(unset)
    );
    println!(
        "Game mode:   {}",
        settings.gamemode.map(|g| g.as_str().to_string()).unwrap_or_else(unset)
    );
    println!("Online mode: {}", settings.online_mode);
    println!("PvP:         {}", settings.pvp);
    println!("Whitelist:   {}", settings.white_list);
}

fn warn_if_exceeds_system_memory(max_memory_mb: u32) {
    if let Some(total) = monitor::total_memory_mb() {
        if u64::from(max_memory_mb) > total {
            tracing::warn!(
                "Requested {}MB of heap but the system only has {}MB",
                max_memory_mb,
                total
            );
        }
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
