//! Proxy login endpoint
//!
//! Lets a headless renderer become a logged-in user without an
//! interactive flow: it arrives with a target URL and a single-use key,
//! the key is exchanged for a session, and the renderer is redirected to
//! the target carrying the session cookie. Nothing is rendered here.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::error::Result;
use crate::session::{SessionManager, SESSION_COOKIE};
use crate::state::AppState;

/// Transport-level parameters; no ambient session or cookies expected
#[derive(Debug, Deserialize)]
pub struct ProxyParams {
    /// Target resource URL, parameters passed through unchanged
    pub url: String,
    /// Single-use access key
    pub key: String,
    /// Instance the key was scoped to
    pub instance: i64,
}

/// Create the proxy router
pub fn router() -> Router<AppState> {
    Router::new().route("/proxy", get(proxy_login))
}

/// Exchange the key for a session, then send the caller on to the target
async fn proxy_login(
    State(state): State<AppState>,
    origin: Option<ConnectInfo<SocketAddr>>,
    Query(params): Query<ProxyParams>,
) -> Result<Response> {
    let origin_ip: Option<IpAddr> = origin.map(|ConnectInfo(addr)| addr.ip());

    let sessions = SessionManager::new(state.db(), state.config().keys.ttl_seconds);
    let session = sessions
        .login_with_key(&params.key, params.instance, origin_ip)
        .await?;

    let cookie = format!("{}={}; Path=/; HttpOnly", SESSION_COOKIE, session.id);

    Ok((
        StatusCode::SEE_OTHER,
        [
            (header::SET_COOKIE, cookie),
            (header::LOCATION, params.url),
        ],
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum_test::TestServer;

    use crate::config::Config;
    use crate::db::create_test_pool;
    use crate::keys::KeyManager;
    use crate::session::SessionStore;
    use crate::storage::MemoryBlobStore;
    use crate::users::UserRepository;

    async fn setup() -> (TestServer, sqlx::SqlitePool, String) {
        let pool = create_test_pool().await;

        let repo = UserRepository::new(&pool);
        let id = repo.create("converter", true).await.unwrap();
        let user = repo.get(id).await.unwrap().unwrap();
        let token = KeyManager::new(&pool, 60)
            .create_key(&user, 42, None)
            .await
            .unwrap();

        let state = AppState::new(
            Config::default(),
            pool.clone(),
            Arc::new(MemoryBlobStore::new()),
        );
        let server = TestServer::new(router().with_state(state)).unwrap();

        (server, pool, token)
    }

    #[tokio::test]
    async fn test_valid_key_redirects_with_session_cookie() {
        let (server, pool, token) = setup().await;

        let response = server
            .get("/proxy")
            .add_query_param("url", "https://example.com/page?id=1")
            .add_query_param("key", &token)
            .add_query_param("instance", "42")
            .await;

        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(
            response.header(header::LOCATION),
            "https://example.com/page?id=1"
        );

        let cookie = response.header(header::SET_COOKIE);
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with(SESSION_COOKIE));

        let session_id = cookie
            .split_once('=')
            .unwrap()
            .1
            .split_once(';')
            .unwrap()
            .0;
        let session = SessionStore::new(&pool)
            .get(session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.instance, 42);
        assert!(session.key_login);
    }

    #[tokio::test]
    async fn test_replayed_key_gets_generic_unauthorized() {
        let (server, _pool, token) = setup().await;

        server
            .get("/proxy")
            .add_query_param("url", "https://example.com/page")
            .add_query_param("key", &token)
            .add_query_param("instance", "42")
            .await
            .assert_status(StatusCode::SEE_OTHER);

        let replay = server
            .get("/proxy")
            .add_query_param("url", "https://example.com/page")
            .add_query_param("key", &token)
            .add_query_param("instance", "42")
            .await;

        replay.assert_status(StatusCode::UNAUTHORIZED);
        // Generic body, no hint at why the exchange failed
        let body = replay.text();
        assert!(body.contains("Authentication failed"));
        assert!(!body.contains("expired"));
        assert!(!body.contains("consumed"));
    }

    #[tokio::test]
    async fn test_unknown_key_gets_generic_unauthorized() {
        let (server, _pool, _token) = setup().await;

        let response = server
            .get("/proxy")
            .add_query_param("url", "https://example.com/page")
            .add_query_param("key", "0000000000000000000000000000000000000000000000000000000000000000")
            .add_query_param("instance", "42")
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }
}
