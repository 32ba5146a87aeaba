// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

use the_ferry::config::{load_and_validate_config, validate_config, FerryConfig};
use the_ferry::runtime::{create_engine, load_module, BridgedInstance, FileFetcher, RunLoop};

fn usage(program: &str) {
    eprintln!("Usage: {} <config.yaml>", program);
    eprintln!("       {} --module <module.wasm|module.wat>", program);
    eprintln!("Example: {} configs/app.yaml", program);
    eprintln!("Example: {} --module build/app.wasm", program);
}

fn load(args: &[String]) -> Result<FerryConfig> {
    match args {
        [_, flag, module] if flag == "--module" => {
            let config = FerryConfig::for_module(module.as_str());
            validate_config(&config).map_err(|findings| {
                let messages: Vec<String> = findings.iter().map(|e| e.to_string()).collect();
                anyhow!("Configuration validation failed:\n{}", messages.join("\n"))
            })?;
            Ok(config)
        }
        [_, path] => load_and_validate_config(path)
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("Failed to load config '{}'", path)),
        _ => {
            usage(&args[0]);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let config = load(&args)?;

    println!("⛴️  The Ferry");
    println!("═══════════════════════════════════");
    println!("Module: {}", config.module);
    println!("Scope:  {}", config.environment.scope);
    println!();

    let started_at = Instant::now();
    let engine = create_engine().context("Failed to create engine")?;
    let (module, path) = load_module(&FileFetcher, &engine, &config.module)
        .await
        .with_context(|| format!("Failed to load module '{}'", config.module))?;
    println!("📦 Compiled via {} path", path);

    let mut instance = BridgedInstance::instantiate(&engine, &module, &config)
        .context("Failed to instantiate module")?;
    instance.start().context("Start entry failed")?;
    println!("🚀 Started ({} live handles)", instance.live_handles());

    let (mut run_loop, handle) = RunLoop::new(instance, config.run.idle_timeout());

    // Ctrl-C asks the loop to stop; otherwise it runs until no timers remain.
    let interrupt = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });
    drop(handle);

    let outcome = run_loop.run().await;
    let elapsed = started_at.elapsed();

    println!();
    println!("📊 Run summary");
    println!("   Stopped:        {}", outcome.reason);
    println!("   Tasks handled:  {}", outcome.tasks_handled);
    println!("   Timers fired:   {}", outcome.timers_fired);
    println!("   Listeners released: {}", outcome.report.registrations_released);
    println!("   Timers cancelled:   {}", outcome.report.timers_cancelled);
    println!("   Destructors run:    {}", outcome.report.destructors_run);
    println!("   Live handles left:  {}", outcome.report.leaked_handles);
    println!("   Elapsed:        {:.2?}", elapsed);

    if let Some(html) = run_loop.instance().body_html() {
        println!();
        println!("📄 Document body");
        println!("{}", html);
    }

    println!("\n🎉 Done!");
    Ok(())
}
