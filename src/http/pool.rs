use reqwest::Client;
use std::time::Duration;
use crate::error::Result;

const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

pub fn create_http_client(connect_timeout: Duration, request_timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .tcp_nodelay(true)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        // Requests go out one at a time, a single idle connection is enough
        .pool_max_idle_per_host(1)
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .build()?;

    Ok(client)
}
