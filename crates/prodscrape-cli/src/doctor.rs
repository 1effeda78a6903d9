//! `prodscrape doctor`: environment readiness check.

use anyhow::Result;
use prodscrape::engine::chromium::find_chromium;
use prodscrape::ScrapeConfig;

pub fn run(config: &ScrapeConfig) -> Result<()> {
    println!("prodscrape doctor");
    println!("=================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    let chromium = find_chromium(config.chromium_path.as_ref());
    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Install Chrome or Chromium, or pass --chromium / set PRODSCRAPE_CHROMIUM_PATH."
        ),
    }
    println!(
        "[OK] Navigation timeout {}s, {} attempt(s), {}s backoff",
        config.navigation_timeout().as_secs(),
        config.max_attempts,
        config.retry_backoff().as_secs()
    );
    if let Some(domain) = &config.storefront_domain {
        println!("[OK] Storefront domain: {domain}");
    }

    println!();
    if chromium.is_some() {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }
    Ok(())
}
