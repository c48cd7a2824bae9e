use crate::capture::ScreenSource;
use crate::error::{Error, Result};
use crate::input::UinputInjector;
use crate::ocr::OcrEngine;
use evdev::Key;
use std::fs;
use std::thread;
use std::time::Duration;
use tempfile::NamedTempFile;
use zbus::blocking::Connection;
use zvariant::ObjectPath;

/// Focus the reader window whose caption contains `title`
///
/// Counterpart of raising the application by name on other desktops; on
/// Plasma the window list and activation both go through KWin scripting.
pub fn activate_window(title: &str) -> Result<()> {
    // KWin script output is not needed; a missing window is reported by the
    // script printing nothing and the reader simply staying unfocused, so
    // the caller should treat activation as best-effort.
    let script = format!(
        r#"
        const clients = workspace.windowList();
        for (let i = 0; i < clients.length; i++) {{
            const c = clients[i];
            if (c.caption.toLowerCase().includes("{}")) {{
                workspace.activeWindow = c;
                break;
            }}
        }}
    "#,
        title.to_lowercase().replace('"', "")
    );
    run_kwin_script(&script)?;
    log::info!("requested focus for window matching '{}'", title);
    Ok(())
}

/// Load, run and unload a KWin script
fn run_kwin_script(script: &str) -> Result<()> {
    let script_file = NamedTempFile::with_suffix(".js")
        .map_err(|e| Error::InputFailed(format!("Failed to create script file: {}", e)))?;

    fs::write(script_file.path(), script)
        .map_err(|e| Error::InputFailed(format!("Failed to write script: {}", e)))?;

    let conn = Connection::session()
        .map_err(|e| Error::InputFailed(format!("DBus connection failed: {}", e)))?;

    let proxy = zbus::blocking::Proxy::new(
        &conn,
        "org.kde.KWin",
        "/Scripting",
        "org.kde.kwin.Scripting",
    )
    .map_err(|e| Error::InputFailed(format!("KWin Scripting interface not found: {}", e)))?;

    let script_path = script_file.path().to_string_lossy().to_string();
    let script_id: i32 = proxy
        .call_method("loadScript", &(&script_path,))
        .map_err(|e| Error::InputFailed(format!("Failed to load script: {}", e)))?
        .body()
        .deserialize()
        .map_err(|e| Error::InputFailed(format!("Invalid script ID: {}", e)))?;

    let script_path_str = format!("/Scripting/Script{}", script_id);
    let script_obj_path = ObjectPath::try_from(script_path_str.as_str())
        .map_err(|e| Error::InputFailed(format!("Invalid script path: {}", e)))?;

    let script_proxy = zbus::blocking::Proxy::new(
        &conn,
        "org.kde.KWin",
        script_obj_path,
        "org.kde.kwin.Script",
    )
    .map_err(|e| Error::InputFailed(format!("Script proxy failed: {}", e)))?;

    script_proxy
        .call_method("run", &())
        .map_err(|e| Error::InputFailed(format!("Failed to run script: {}", e)))?;

    // Give script time to execute
    thread::sleep(Duration::from_millis(200));

    let _ = proxy.call_method("unloadScript", &(&script_path,));

    Ok(())
}

/// Try to read the book's total page count from its info dialog
///
/// Opens the dialog with ctrl+i, captures and OCRs it, closes it with
/// escape, and scans the text for page-count figures. The result is
/// advisory; any failure yields `None` with a warning.
pub fn detect_total_pages(
    source: &mut dyn ScreenSource,
    injector: &mut UinputInjector,
    ocr: &OcrEngine,
    settle: Duration,
) -> Option<usize> {
    log::info!("looking up the book's total page count...");
    match read_info_dialog(source, injector, ocr, settle) {
        Ok(text) => match parse_total_pages(&text) {
            Some(total) => {
                log::info!("total page count: {} pages", total);
                Some(total)
            }
            None => {
                log::warn!("could not detect a total page count");
                None
            }
        },
        Err(e) => {
            log::warn!("total page count lookup failed: {}", e);
            None
        }
    }
}

fn read_info_dialog(
    source: &mut dyn ScreenSource,
    injector: &mut UinputInjector,
    ocr: &OcrEngine,
    settle: Duration,
) -> Result<String> {
    injector.key_chord(Key::KEY_LEFTCTRL, Key::KEY_I)?;
    thread::sleep(settle);

    let frame = source.capture()?;
    let text = ocr.extract_frame(&frame);

    // Close the dialog whether or not OCR worked
    injector.key_click(Key::KEY_ESC)?;
    thread::sleep(Duration::from_secs(1));

    text
}

/// Scan OCR text for page-count figures and return the largest
///
/// Recognized forms: "123 ページ", "ページ数: 123", "12 of 345" and
/// "12/345" (the leading figure, as readers print the current page first).
pub fn parse_total_pages(text: &str) -> Option<usize> {
    let mut candidates: Vec<usize> = Vec::new();

    for line in text.lines() {
        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            if chars[i].is_ascii_digit() {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let number: usize = match chars[start..i].iter().collect::<String>().parse() {
                    Ok(n) => n,
                    Err(_) => continue,
                };

                let prefix: String = chars[..start].iter().collect();
                let suffix: String = chars[i..].iter().collect();
                let prefix = prefix.trim_end();
                let suffix = suffix.trim_start();

                let page_suffix = suffix.starts_with("ページ");
                let labeled_prefix =
                    prefix.ends_with("ページ数:") || prefix.ends_with("ページ数：");
                let of_pair = suffix
                    .strip_prefix("of ")
                    .map(|rest| rest.trim_start().starts_with(|c: char| c.is_ascii_digit()))
                    .unwrap_or(false);
                let slash_pair = suffix
                    .strip_prefix('/')
                    .map(|rest| rest.trim_start().starts_with(|c: char| c.is_ascii_digit()))
                    .unwrap_or(false);

                if page_suffix || labeled_prefix || of_pair || slash_pair {
                    candidates.push(number);
                }
            } else {
                i += 1;
            }
        }
    }

    candidates.into_iter().max()
}
