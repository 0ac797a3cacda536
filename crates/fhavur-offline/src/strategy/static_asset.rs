//! Cache-first strategy for images, fonts, audio and scripts

use super::{WorkerContext, cache_first};
use crate::{
    classify::Classification,
    fallback::{image_placeholder, offline_resource},
    request::{FetchRequest, RequestDestination},
    response::FetchResponse,
};
use std::sync::Arc;
use tracing::info;

pub async fn handle(
    ctx: &Arc<WorkerContext>,
    request: &FetchRequest,
    classification: Classification,
) -> FetchResponse {
    cache_first(ctx, request, classification, |error| {
        let is_image = request.destination == RequestDestination::Image
            || ctx.classifier.is_image_url(&request.url);

        info!(url = %request.url, error = %error, is_image, "Serving offline asset fallback");
        if is_image {
            image_placeholder()
        } else {
            offline_resource()
        }
    })
    .await
}
