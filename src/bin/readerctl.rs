use readerctl::{BookRun, Config, KWinScreenSource, PageComparer, ScreenSource, StopReason};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

fn main() -> readerctl::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "run" => return run_interactive(),
            "capture" => {
                let title = args.get(2).map(|s| s.as_str()).unwrap_or("");
                if title.is_empty() {
                    eprintln!("Usage: readerctl capture <book title> [pages]");
                    eprintln!("Example: readerctl capture \"走れメロス\" 50");
                    std::process::exit(1);
                }
                let budget = args.get(3).and_then(|s| s.parse().ok());
                return run_capture(title, budget);
            }
            "probe" => return run_probe(),
            "screenshot" => {
                let output_path = args
                    .get(2)
                    .map(|s| s.as_str())
                    .unwrap_or("/tmp/readerctl_screenshot.png");
                return run_screenshot(output_path);
            }
            "ocr" => {
                let dir = args.get(2).map(|s| s.as_str()).unwrap_or("");
                if dir.is_empty() {
                    eprintln!("Usage: readerctl ocr <screenshots dir>");
                    std::process::exit(1);
                }
                return run_ocr(dir);
            }
            "summarize" => {
                let file = args.get(2).map(|s| s.as_str()).unwrap_or("");
                if file.is_empty() {
                    eprintln!("Usage: readerctl summarize <text file>");
                    std::process::exit(1);
                }
                return run_summarize(file);
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => {
                eprintln!("Unknown command: {}\n", other);
                print_help();
                std::process::exit(1);
            }
        }
    }

    print_help();
    Ok(())
}

fn run_interactive() -> readerctl::Result<()> {
    let config = Config::load();

    println!("=== readerctl: e-reader text extraction ===\n");

    if config.drive.access_token.is_some() {
        println!("Drive upload:  configured");
    } else {
        println!("Drive upload:  not configured (optional)");
    }
    if config.llm.api_key.is_some() {
        println!("Summarization: configured");
    } else {
        println!("Summarization: not configured (optional)");
    }
    println!();

    let title = loop {
        let title = prompt("Book title: ")?;
        if !title.is_empty() {
            break title;
        }
        println!("Please enter a book title.");
    };

    let budget = loop {
        let input = prompt("Pages to capture (Enter = detect automatically): ")?;
        if input.is_empty() {
            break None;
        }
        match input.parse::<usize>() {
            Ok(n) if n > 0 => break Some(n),
            _ => println!("Please enter a number greater than zero."),
        }
    };

    println!();
    println!("Before starting, make sure that:");
    println!("  - the reader application is visible and showing the book");
    println!("  - the book is on its first page");
    println!("  - you leave the mouse and keyboard alone while it runs");
    println!();

    let confirm = prompt("Start? [y/N]: ")?;
    if !confirm.eq_ignore_ascii_case("y") && !confirm.eq_ignore_ascii_case("yes") {
        println!("Cancelled.");
        return Ok(());
    }

    for i in (1..=5).rev() {
        println!("Starting in {}...", i);
        thread::sleep(Duration::from_secs(1));
    }
    println!();

    let report = BookRun::new(config, &title)
        .with_page_budget(budget)
        .execute()?;

    println!();
    println!(
        "{}",
        serde_json::json!({
            "book": title,
            "pages": report.pages.len(),
            "status": report.reason.to_string(),
            "direction": report.direction.to_string(),
        })
    );

    if matches!(report.reason, StopReason::CaptureFailed(_)) {
        std::process::exit(1);
    }
    Ok(())
}

fn run_capture(title: &str, budget: Option<usize>) -> readerctl::Result<()> {
    let config = Config::load();
    let report = BookRun::new(config, title)
        .with_page_budget(budget)
        .execute()?;

    println!(
        "{}",
        serde_json::json!({
            "book": title,
            "pages": report.pages.len(),
            "status": report.reason.to_string(),
            "direction": report.direction.to_string(),
        })
    );

    if matches!(report.reason, StopReason::CaptureFailed(_)) {
        std::process::exit(1);
    }
    Ok(())
}

fn run_probe() -> readerctl::Result<()> {
    let config = Config::load();
    let mut source = KWinScreenSource::new();
    let mut injector = readerctl::UinputInjector::new()?;
    let comparer = PageComparer::new(config.compare.clone());
    let settle = Duration::from_secs_f64(config.capture.page_turn_delay_secs);

    if let Err(e) = readerctl::reader::activate_window(&config.reader.window_title) {
        eprintln!("Warning: could not focus the reader window: {}", e);
    }
    thread::sleep(Duration::from_secs_f64(config.reader.focus_delay_secs));

    let direction = readerctl::probe_direction(&mut source, &mut injector, &comparer, settle);
    println!("{}", serde_json::json!({ "direction": direction.to_string() }));
    Ok(())
}

fn run_screenshot(output_path: &str) -> readerctl::Result<()> {
    let frame = KWinScreenSource::new().capture()?;
    frame.save_png(Path::new(output_path))?;
    let (width, height) = frame.dimensions();
    eprintln!("Screenshot saved to: {} ({}x{})", output_path, width, height);
    Ok(())
}

fn run_ocr(dir: &str) -> readerctl::Result<()> {
    let config = Config::load();
    let engine = readerctl::ocr::OcrEngine::new(config.ocr.clone());

    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|e| e == "png").unwrap_or(false))
        .collect();
    paths.sort();

    if paths.is_empty() {
        eprintln!("No .png files found in {}", dir);
        std::process::exit(1);
    }

    let mut texts = Vec::new();
    for (i, path) in paths.iter().enumerate() {
        eprintln!("[{}/{}] {}", i + 1, paths.len(), path.display());
        match engine.extract_file(path) {
            Ok(text) if !text.is_empty() => texts.push(text),
            Ok(_) => {}
            Err(e) => eprintln!("  failed: {}", e),
        }
    }

    println!("{}", texts.join("\n\n"));
    Ok(())
}

fn run_summarize(file: &str) -> readerctl::Result<()> {
    let config = Config::load();
    let Some(summarizer) = readerctl::Summarizer::from_settings(&config.llm) else {
        eprintln!("No LLM API key configured - set READERCTL_API_KEY");
        std::process::exit(1);
    };

    let text = fs::read_to_string(file)?;
    let summary = summarizer.summarize(&text)?;
    println!("{}", summary);
    Ok(())
}

fn prompt(message: &str) -> io::Result<String> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_string())
}

fn print_help() {
    println!("readerctl - screen-capture driven e-reader text extraction\n");
    println!("USAGE:");
    println!("    readerctl run                      Interactive full run (capture + OCR + upload + summary)");
    println!("    readerctl capture <title> [pages]  Non-interactive full run");
    println!("    readerctl probe                    Report which arrow key turns the page");
    println!("    readerctl screenshot [path]        Capture one screenshot");
    println!("    readerctl ocr <dir>                Extract text from captured page images");
    println!("    readerctl summarize <file>         Summarize an extracted text file");
    println!("    readerctl --help                   Show this help\n");
    println!("ENVIRONMENT:");
    println!("    READERCTL_API_KEY       LLM API key for summarization (optional)");
    println!("    READERCTL_DRIVE_TOKEN   Google Drive OAuth access token (optional)");
    println!("    READERCTL_DRIVE_FOLDER  Google Drive parent folder id (optional)");
    println!("    RUST_LOG                Log level filter [default: info]\n");
    println!("CONFIG:");
    println!("    ~/.config/readerctl/config.toml    Thresholds, delays and paths");
}
