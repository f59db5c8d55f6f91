use crate::models::{Ad, AdListItem, AdType, CreateAdRequest, DeleteResponse};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::list_ads,
        crate::routes::create_ad,
        crate::routes::update_ad,
        crate::routes::delete_ad,
    ),
    components(schemas(Ad, AdListItem, AdType, CreateAdRequest, DeleteResponse)),
    tags(
        (name = "ads", description = "Ad collection operations"),
    )
)]
pub struct ApiDoc;
