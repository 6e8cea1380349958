use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::time::SystemTime;

use crate::config::Constants;

static SIGNUP_ATTEMPTS: Lazy<DashMap<String, Vec<SystemTime>>> = Lazy::new(DashMap::new);

/// Check if signup attempts from this address exceed the rate limit
pub fn check_signup_rate_limit(addr: &SocketAddr) -> Result<(), String> {
    let ip = addr.ip().to_string();
    let now = SystemTime::now();

    let mut entry = SIGNUP_ATTEMPTS.entry(ip).or_default();
    entry.retain(|&t| now.duration_since(t).unwrap_or_default() < Constants::RATE_LIMIT_WINDOW);

    if entry.len() >= Constants::MAX_SIGNUP_ATTEMPTS {
        return Err("Too many signup attempts. Try again later.".to_string());
    }

    entry.push(now);
    Ok(())
}
