//! Stop command - signal the background runner recorded in the pidfile.

use std::time::Duration;

use anyhow::{bail, Result};
use colored::Colorize;

use crate::commands::start::read_live_pid;
use crate::config::{brain_dir, pidfile_path};

pub fn run() -> Result<()> {
    let pidfile = pidfile_path(&brain_dir());
    let Some(pid) = read_live_pid(&pidfile) else {
        let _ = std::fs::remove_file(&pidfile);
        println!("{}", "Runner is not running.".yellow());
        return Ok(());
    };

    println!("Stopping runner (pid {pid})...");
    unsafe {
        libc::kill(pid as i32, libc::SIGTERM);
    }

    // Give the loop a moment to drain before declaring success.
    for _ in 0..50 {
        std::thread::sleep(Duration::from_millis(100));
        if unsafe { libc::kill(pid as i32, 0) } != 0 {
            let _ = std::fs::remove_file(&pidfile);
            println!("{}", "Runner stopped.".green());
            return Ok(());
        }
    }

    bail!("runner (pid {pid}) did not exit within 5s; kill it manually if needed");
}
