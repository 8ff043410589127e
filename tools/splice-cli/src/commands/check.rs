//! Check system capabilities.

use splice_render_engine::video::command_exists;

pub fn run() -> anyhow::Result<()> {
    println!("Splice System Check");
    println!("{}", "=".repeat(50));

    println!("[OK] WAV export: built in");
    if command_exists("ffmpeg") {
        println!("[OK] ffmpeg: found (mp4-h264 and webm export available)");
    } else {
        println!("[WARN] ffmpeg: not found in PATH (video export disabled)");
    }

    let config_path = splice_common::config::config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[--] Config: defaults ({} not present)", config_path.display());
    }

    Ok(())
}
