use super::context;
use crate::spotify;

pub async fn auth() {
    spotify::auth::auth(context::spotify_config()).await;
}
