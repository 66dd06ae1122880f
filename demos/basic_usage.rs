use std::sync::Arc;

use secure_prefs::config::StoreConfig;
use secure_prefs::location::LocationFix;
use secure_prefs::{PreferencesController, PreferencesForm};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // On native platforms this uses the data directory for the namespace;
    // on WASM it uses localStorage.
    let config = StoreConfig::load("secure_prefs.toml").expect("Failed to read config");
    let store = config
        .open_store("com.example.myapp")
        .expect("Failed to open preferences store");
    println!("Preferences stored at: {}", store.path());

    let mut screen = PreferencesController::new(Arc::clone(&store))
        .with_location_request(config.location.request());
    screen.activate();

    println!("Current preferences:");
    println!("  Name: {}", screen.preferences().name);
    println!("  Dark mode: {}", screen.preferences().dark_mode);
    println!("  Language: {}", screen.preferences().language());
    println!("  Volume: {}%", screen.preferences().volume_percent);
    println!("  Last access: {}", screen.last_access());
    println!("  Last location: {}", screen.last_location());
    println!("  Total usage: {}", screen.usage_display());

    screen.on_location_changed(LocationFix::new(37.7749, -122.4194));

    let mut form = screen.form();
    form.name = "Alice".to_string();
    form.volume = 65.0;
    screen.submit(&PreferencesForm {
        dark_mode: !form.dark_mode,
        ..form
    });

    screen.pause();

    println!("\nUpdated preferences:");
    println!("  Name: {}", screen.preferences().name);
    println!("  Dark mode: {}", screen.preferences().dark_mode);
    println!("  Last location: {}", screen.last_location());
    println!("  Total usage: {}", screen.usage_display());
}
