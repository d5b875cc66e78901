mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, Format};
use smm_codec::{archive, sniff, Course, CourseView, Sniffed, WiiuSave};
use smm_core::config::Config;
use tokio_util::sync::CancellationToken;

async fn start_server(host: Option<String>, port: Option<u16>, config_path: Option<&Path>) -> Result<()> {
    let mut config = Config::load_or_default(config_path);

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting smmdb server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    smm_server::start(config, CancellationToken::new()).await?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "smmdb=trace,smm_server=trace,smm_ingest=trace,smm_codec=debug,smm_db=debug,tower_http=debug"
                .to_string()
        } else {
            "smmdb=info,smm_server=info,smm_ingest=info,smm_codec=info,smm_db=info,tower_http=info"
                .to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Inspect { input, json } => inspect(&input, json),
        Commands::Convert {
            input,
            output,
            to,
            index,
        } => convert(&input, &output, to, index),
        Commands::CreateAccount { username, admin } => {
            create_account(cli.config.as_deref(), &username, admin)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("smmdb {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Decode every course reachable from `input`: a Wii U course folder, a
/// course archive, a 3DS course file or a canonical course buffer.
fn load_courses(input: &Path) -> Result<Vec<Course>> {
    if input.is_dir() {
        let save = WiiuSave::read_dir(input)?;
        return Ok(vec![Course::from_wiiu(&save)?]);
    }

    let buf = std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    match sniff(&buf) {
        Sniffed::SingleBinary => Ok(vec![Course::from_3ds(&buf)?]),
        Sniffed::Archive(kind) => {
            let courses = archive::extract_courses(&buf, kind)?
                .iter()
                .map(Course::from_wiiu)
                .collect::<smm_core::Result<Vec<_>>>()?;
            if courses.is_empty() {
                return Err(smm_core::Error::NoCourseFound.into());
            }
            Ok(courses)
        }
        Sniffed::Unrecognized { mime } => match Course::decode(&buf) {
            Ok(course) => Ok(vec![course]),
            Err(_) => Err(smm_core::Error::UnsupportedFormat {
                mime: mime.map(String::from),
            }
            .into()),
        },
    }
}

fn inspect(input: &Path, json: bool) -> Result<()> {
    let courses = load_courses(input)?;

    if json {
        let views: Vec<CourseView> = courses.iter().map(CourseView::from).collect();
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    for (i, course) in courses.iter().enumerate() {
        let g = &course.gameplay;
        println!("[{i}] {}", course.title());
        println!("    Maker: {}", course.maker());
        println!("    Modified: {}", course.modified());
        println!("    Style: {}  Theme: {} / {}", g.game_style, g.course_theme, g.course_theme_sub);
        println!("    Time: {}s  Auto-scroll: {} / {}", g.time, g.auto_scroll, g.auto_scroll_sub);
        println!("    Width: {} / {}", g.width, g.width_sub);
        println!(
            "    Tiles: {} / {}  Sounds: {} / {}",
            course.level.tiles.len(),
            course.level.tiles_sub.len(),
            course.level.sounds.len(),
            course.level.sounds_sub.len()
        );
        if course.is_thumbnail_broken() {
            println!("    Thumbnails: broken");
        }
    }

    Ok(())
}

fn convert(input: &Path, output: &Path, to: Format, index: usize) -> Result<()> {
    let courses = load_courses(input)?;
    let count = courses.len();
    let course = courses
        .into_iter()
        .nth(index)
        .with_context(|| format!("Course index {index} out of range ({count} found)"))?;

    match to {
        Format::Wiiu => course.to_wiiu()?.write_dir(output)?,
        Format::N3ds => std::fs::write(output, course.to_3ds()?)?,
        Format::Json => std::fs::write(output, serde_json::to_vec_pretty(&CourseView::from(&course))?)?,
        Format::Raw => std::fs::write(output, course.encode()?)?,
    }

    println!("Wrote \"{}\" to {}", course.title(), output.display());
    Ok(())
}

fn create_account(config_path: Option<&Path>, username: &str, admin: bool) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let db = smm_db::init_pool(&config.server.db_path)?;
    let conn = smm_db::get_conn(&db)?;

    if smm_db::queries::accounts::get_account_by_username(&conn, username)?.is_some() {
        anyhow::bail!("Account {username} already exists");
    }

    let permissions = if admin { smm_db::models::Account::ADMIN } else { 0 };
    let account = smm_db::queries::accounts::create_account(&conn, username, permissions)?;
    println!("{}", account.api_key);
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let contents = std::fs::read_to_string(p)
                .with_context(|| format!("Failed to read {}", p.display()))?;
            let config = Config::from_json(&contents)?;
            println!("✓ Configuration is valid");
            print_config(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            print_config(&Config::default());
        }
    }

    Ok(())
}

fn print_config(config: &Config) {
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Database: {}", config.server.db_path.display());
    println!("  Max body: {} bytes", config.server.max_body_bytes);
    match config.storage.uploads_dir {
        Some(ref dir) => println!("  Uploads archived to: {}", dir.display()),
        None => println!("  Uploads archived to: (disabled)"),
    }
    println!("  Zip cleanup delay: {}s", config.delivery.cleanup_delay_secs);
    println!("  WebP thumbnails: {}", config.thumbnails.webp);
    for warning in config.validate() {
        println!("  ⚠ {warning}");
    }
}
