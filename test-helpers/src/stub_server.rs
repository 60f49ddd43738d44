//! A small actix-web backend for exercising `APIClient` over real HTTP.
//!
//! It serves a fixed set of recipes and answers a few routes with the
//! error shapes the real backend produces: JSON `message`, JSON `error`,
//! plain text and empty bodies.

use actix_web::dev::Server;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use payloads::requests::{ListRecipes, RateRecipe};
use payloads::responses::{FavoriteStatus, Profile, Recipe, RecipeList};
use payloads::{APIClient, RecipeId};
use serde_json::json;
use std::net::TcpListener;
use uuid::Uuid;

use crate::mock;

pub const STUB_TOKEN: &str = "stub-access-token";

struct StubData {
    recipes: Vec<Recipe>,
    profile: Profile,
}

pub struct StubServer {
    pub port: u16,
    pub address: String,
    /// Served in this order by the list route. Steps are stored out of
    /// order so clients must normalize.
    pub recipes: Vec<Recipe>,
    pub profile: Profile,
}

impl StubServer {
    pub fn client(&self) -> APIClient {
        APIClient::new(self.address.clone())
    }

    /// A client that sends the bearer token the stub accepts.
    pub fn authorized_client(&self) -> APIClient {
        let client = self.client();
        client.set_access_token(Some(STUB_TOKEN.to_string()));
        client
    }
}

/// Start the stub on an OS-assigned port. Must be called from inside a
/// tokio runtime.
pub async fn spawn_stub_server() -> anyhow::Result<StubServer> {
    crate::init_tracing();
    let profile = mock::alice();
    let recipes: Vec<Recipe> = mock::recipes(&profile, 8)
        .into_iter()
        .map(|mut recipe| {
            recipe.steps.reverse();
            recipe
        })
        .collect();

    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    let server = build(
        listener,
        StubData {
            recipes: recipes.clone(),
            profile: profile.clone(),
        },
    )?;
    tokio::spawn(server);

    Ok(StubServer {
        port,
        address: format!("http://127.0.0.1:{port}"),
        recipes,
        profile,
    })
}

fn build(listener: TcpListener, data: StubData) -> std::io::Result<Server> {
    let data = web::Data::new(data);
    let server = HttpServer::new(move || {
        App::new().app_data(data.clone()).service(
            web::scope("/api")
                .route("/recipes", web::get().to(list_recipes))
                .route("/recipes/{id}", web::get().to(get_recipe))
                .route("/recipes/{id}/favorite", web::post().to(add_favorite))
                .route(
                    "/recipes/{id}/favorite",
                    web::delete().to(remove_favorite),
                )
                .route("/recipes/{id}/rating", web::put().to(rate_recipe))
                .route("/categories", web::get().to(get_categories))
                .route("/profile", web::get().to(get_profile)),
        )
    })
    .workers(1)
    .listen(listener)?
    .run();
    Ok(server)
}

fn is_authorized(request: &HttpRequest) -> bool {
    request
        .headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Bearer {STUB_TOKEN}"))
}

#[tracing::instrument(skip(data))]
async fn list_recipes(
    data: web::Data<StubData>,
    query: web::Query<ListRecipes>,
) -> HttpResponse {
    let matching: Vec<&Recipe> = data
        .recipes
        .iter()
        .filter(|recipe| {
            query
                .search
                .as_ref()
                .is_none_or(|search| recipe.title.contains(search.as_str()))
        })
        .collect();
    let skip = (query.page.saturating_sub(1) * query.page_size) as usize;
    HttpResponse::Ok().json(RecipeList {
        recipes: matching
            .iter()
            .skip(skip)
            .take(query.page_size as usize)
            .map(|recipe| (*recipe).clone())
            .collect(),
        total: matching.len() as u64,
    })
}

#[tracing::instrument(skip(data))]
async fn get_recipe(
    data: web::Data<StubData>,
    path: web::Path<Uuid>,
) -> HttpResponse {
    let recipe_id = RecipeId(path.into_inner());
    let recipe = data.recipes.iter().find(|recipe| recipe.id == recipe_id);
    HttpResponse::Ok().json(recipe)
}

async fn add_favorite(request: HttpRequest) -> HttpResponse {
    if !is_authorized(&request) {
        return HttpResponse::Unauthorized()
            .json(json!({ "error": "Missing bearer token" }));
    }
    HttpResponse::Ok().json(FavoriteStatus { is_favorite: true })
}

async fn remove_favorite(request: HttpRequest) -> HttpResponse {
    if !is_authorized(&request) {
        return HttpResponse::Unauthorized()
            .json(json!({ "error": "Missing bearer token" }));
    }
    HttpResponse::Ok().json(FavoriteStatus { is_favorite: false })
}

async fn rate_recipe(
    data: web::Data<StubData>,
    body: web::Json<RateRecipe>,
) -> HttpResponse {
    if data.recipes.iter().any(|recipe| recipe.id == body.recipe_id) {
        HttpResponse::NoContent().finish()
    } else {
        HttpResponse::NotFound()
            .content_type("text/plain")
            .body("Recipe not found")
    }
}

async fn get_categories() -> HttpResponse {
    HttpResponse::ServiceUnavailable().finish()
}

async fn get_profile(
    data: web::Data<StubData>,
    request: HttpRequest,
) -> HttpResponse {
    if !is_authorized(&request) {
        return HttpResponse::Unauthorized()
            .json(json!({ "message": "Not signed in" }));
    }
    HttpResponse::Ok().json(&data.profile)
}
