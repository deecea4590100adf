//! Pulls a live RTSP stream and dumps the elementary stream to a file.

use failure::Error;
use log::{error, info, warn};
use std::fmt::Write as _;
use std::io::Write;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "rivulet", about = "Dump a live RTSP stream to a raw elementary stream file")]
struct Opts {
    /// rtsp:// or rtsps:// URL, optionally with embedded credentials.
    url: String,

    /// Output file for the video elementary stream; omit to just log.
    #[structopt(short, long)]
    out: Option<std::path::PathBuf>,

    /// Accept any TLS certificate (rtsps only).
    #[structopt(long)]
    insecure: bool,
}

/// Returns a pretty-and-informative version of `e`.
fn prettify_failure(e: &Error) -> String {
    let mut msg = e.to_string();
    for cause in e.iter_causes() {
        write!(&mut msg, "\ncaused by: {}", cause).unwrap();
    }
    msg
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = main_inner().await {
        error!("Fatal: {}", prettify_failure(&e));
        std::process::exit(1);
    }
    info!("Done");
}

async fn main_inner() -> Result<(), Error> {
    let opts = Opts::from_args();
    let client = rivulet::Client::new(&opts.url)?;
    if opts.insecure {
        client.skip_tls_verify();
    }
    let mut out = match &opts.out {
        Some(path) => Some(std::fs::File::create(path)?),
        None => None,
    };
    client.on_frame(move |frame| {
        info!(
            "{:?} frame ts={} len={}{}",
            frame.codec,
            frame.timestamp,
            frame.data.len(),
            if frame.is_key { " key" } else { "" }
        );
        if frame.codec.is_video() {
            if let Some(f) = out.as_mut() {
                if let Err(e) = f.write_all(&frame.data) {
                    warn!("write failed: {}", e);
                }
            }
        }
    });
    client.start().await?;
    tokio::signal::ctrl_c().await?;
    client.stop().await;
    Ok(())
}
