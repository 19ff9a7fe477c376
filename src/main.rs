use std::sync::Arc;

use clap::Parser;
use log::error;
use warp::filters::BoxedFilter;
use warp::http::{header, StatusCode, Uri};
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

mod args;
mod auth;
mod backend;
mod fruit;
mod fruitstand;
mod user;
mod views;

use args::Args;
use auth::SessionId;
use backend::Backend;
use fruit::{FruitForm, FruitOverrideForm};
use fruitstand::{Error, FruitStand, FruitStandAuthed};
use user::AccountForm;

#[tokio::main]
async fn main() {
    pretty_env_logger::formatted_timed_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let addr = args.addr().expect("listen address");

    let backend = Backend::new(args.data_dir()).await;
    let stand = Arc::new(FruitStand::new(backend));

    warp::serve(routes(stand, args.secure())).run(addr).await;
}

fn routes(stand: Arc<FruitStand>, secure: bool) -> BoxedFilter<(Response,)> {
    let root = warp::path::end()
        .and(warp::get())
        .map(|| warp::redirect::see_other(Uri::from_static("/fruits")));

    let fruits = {
        let seed = warp::path!("fruits" / "seed")
            .and(warp::get())
            .and(authed(&stand))
            .and_then(seed_fruits);

        let index = warp::path!("fruits")
            .and(warp::get())
            .and(authed(&stand))
            .and_then(list_fruits);

        let new = warp::path!("fruits" / "new")
            .and(warp::get())
            .and(authed(&stand))
            .map(|_authed: FruitStandAuthed| warp::reply::html(views::fruit_new()));

        let create = warp::path!("fruits")
            .and(warp::post())
            .and(authed(&stand))
            .and(warp::body::form())
            .and_then(create_fruit);

        let edit = warp::path!("fruits" / String / "edit")
            .and(warp::get())
            .and(authed(&stand))
            .and_then(edit_fruit);

        let update = warp::path!("fruits" / String)
            .and(warp::put())
            .and(authed(&stand))
            .and(warp::body::form())
            .and_then(update_fruit);

        // html forms can only POST, so mutations arrive here too
        let tunnel = warp::path!("fruits" / String)
            .and(warp::post())
            .and(authed(&stand))
            .and(warp::body::form())
            .and_then(tunnel_fruit);

        let delete = warp::path!("fruits" / String)
            .and(warp::delete())
            .and(authed(&stand))
            .and_then(delete_fruit);

        let show = warp::path!("fruits" / String)
            .and(warp::get())
            .and(authed(&stand))
            .and_then(show_fruit);

        seed.or(index)
            .or(new)
            .or(create)
            .or(edit)
            .or(update)
            .or(tunnel)
            .or(delete)
            .or(show)
    };

    let users = {
        let signup_page = warp::path!("user" / "signup")
            .and(warp::get())
            .map(|| warp::reply::html(views::signup_page()));

        let signup = warp::path!("user" / "signup")
            .and(warp::post())
            .and(with_stand(&stand))
            .and(warp::body::form())
            .and_then(signup_user);

        let login_page = warp::path!("user" / "login")
            .and(warp::get())
            .map(|| warp::reply::html(views::login_page()));

        let login = warp::path!("user" / "login")
            .and(warp::post())
            .and(with_stand(&stand))
            .and(warp::any().map(move || secure))
            .and(warp::body::form())
            .and_then(login_user);

        let logout = warp::path!("user" / "logout")
            .and(warp::get())
            .and(with_stand(&stand))
            .and(warp::cookie::optional::<String>(auth::SESSION_COOKIE))
            .and_then(logout_user);

        signup_page.or(signup).or(login_page).or(login).or(logout)
    };

    root.or(fruits)
        .or(users)
        .recover(handle_rejection)
        .with(warp::log("fruitstand"))
        .map(|reply| Reply::into_response(reply))
        .boxed()
}

fn with_stand(
    stand: &Arc<FruitStand>,
) -> impl Filter<Extract = (Arc<FruitStand>,), Error = std::convert::Infallible> + Clone {
    let stand = Arc::clone(stand);
    warp::any().map(move || Arc::clone(&stand))
}

/// The session gate: resolve the session cookie to a logged-in user,
/// or reject. The rejection handler turns the rejection into a
/// redirect to the login page.
fn authed(
    stand: &Arc<FruitStand>,
) -> impl Filter<Extract = (FruitStandAuthed,), Error = Rejection> + Clone {
    let stand = Arc::clone(stand);
    warp::cookie::optional::<String>(auth::SESSION_COOKIE).and_then(
        move |cookie: Option<String>| {
            let stand = Arc::clone(&stand);
            async move {
                let session_id = cookie
                    .as_deref()
                    .and_then(|c| c.parse::<SessionId>().ok())
                    .ok_or_else(|| warp::reject::custom(Error::Unauthorized))?;

                stand
                    .authenticate(session_id)
                    .await
                    .map_err(warp::reject::custom)
            }
        },
    )
}

fn see_fruits() -> impl Reply {
    warp::redirect::see_other(Uri::from_static("/fruits"))
}

async fn seed_fruits(authed: FruitStandAuthed) -> Result<impl Reply, Rejection> {
    let fruits = authed.seed().await.map_err(warp::reject::custom)?;

    Ok(warp::reply::json(&fruits))
}

async fn list_fruits(authed: FruitStandAuthed) -> Result<impl Reply, Rejection> {
    let fruits = authed.fruits().await.map_err(warp::reject::custom)?;

    Ok(warp::reply::html(views::fruits_index(
        authed.username(),
        &fruits,
    )))
}

async fn create_fruit(authed: FruitStandAuthed, form: FruitForm) -> Result<impl Reply, Rejection> {
    authed
        .create_fruit(form)
        .await
        .map_err(warp::reject::custom)?;

    Ok(see_fruits())
}

async fn edit_fruit(id: String, authed: FruitStandAuthed) -> Result<impl Reply, Rejection> {
    let html = match authed.fruit(&id).await.map_err(warp::reject::custom)? {
        Some(fruit) => views::fruit_edit(&fruit),
        None => views::fruit_missing(),
    };

    Ok(warp::reply::html(html))
}

async fn update_fruit(
    id: String,
    authed: FruitStandAuthed,
    form: FruitForm,
) -> Result<impl Reply, Rejection> {
    authed
        .update_fruit(&id, form)
        .await
        .map_err(warp::reject::custom)?;

    Ok(see_fruits())
}

async fn tunnel_fruit(
    id: String,
    authed: FruitStandAuthed,
    form: FruitOverrideForm,
) -> Result<impl Reply, Rejection> {
    let (method, form) = form.into_parts();

    match method.as_str() {
        "PUT" => authed.update_fruit(&id, form).await,
        "DELETE" => authed.delete_fruit(&id).await,
        _ => {
            error!("unsupported method override {method:?}");
            Err(Error::BadRequest)
        }
    }
    .map_err(warp::reject::custom)?;

    Ok(see_fruits())
}

async fn delete_fruit(id: String, authed: FruitStandAuthed) -> Result<impl Reply, Rejection> {
    authed
        .delete_fruit(&id)
        .await
        .map_err(warp::reject::custom)?;

    Ok(see_fruits())
}

async fn show_fruit(id: String, authed: FruitStandAuthed) -> Result<impl Reply, Rejection> {
    let html = match authed.fruit(&id).await.map_err(warp::reject::custom)? {
        Some(fruit) => views::fruit_show(&fruit),
        None => views::fruit_missing(),
    };

    Ok(warp::reply::html(html))
}

async fn signup_user(stand: Arc<FruitStand>, form: AccountForm) -> Result<impl Reply, Rejection> {
    stand.signup(form).await.map_err(warp::reject::custom)?;

    Ok(warp::redirect::see_other(Uri::from_static("/user/login")))
}

async fn login_user(
    stand: Arc<FruitStand>,
    secure: bool,
    form: AccountForm,
) -> Result<impl Reply, Rejection> {
    let authed = stand.login(form).await.map_err(warp::reject::custom)?;

    let cookie = auth::session_cookie(authed.session_id(), secure);
    Ok(warp::reply::with_header(
        see_fruits(),
        header::SET_COOKIE,
        cookie,
    ))
}

async fn logout_user(
    stand: Arc<FruitStand>,
    cookie: Option<String>,
) -> Result<impl Reply, Rejection> {
    if let Some(session_id) = cookie.as_deref().and_then(|c| c.parse::<SessionId>().ok()) {
        if let Ok(authed) = stand.authenticate(session_id).await {
            // the redirect happens whether or not the store managed
            // to forget the session
            let _ = authed.logout().await;
        }
    }

    let reply = warp::redirect::see_other(Uri::from_static("/user/login"));
    Ok(warp::reply::with_header(
        reply,
        header::SET_COOKIE,
        auth::clear_session_cookie(),
    ))
}

async fn handle_rejection(err: Rejection) -> Result<Response, Rejection> {
    let Some(&e) = err.find::<Error>() else {
        return Err(err);
    };

    Ok(match e {
        Error::Unauthorized => {
            warp::redirect::see_other(Uri::from_static("/user/login")).into_response()
        }
        _ => {
            let status: StatusCode = e.into();
            warp::reply::with_status("error, read logs for details", status).into_response()
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::fruit::Fruit;

    async fn create_routes() -> BoxedFilter<(Response,)> {
        let stand = Arc::new(FruitStand::new(backend::test::create_backend().await));

        routes(stand, false)
    }

    const FORM_TYPE: &str = "application/x-www-form-urlencoded";

    async fn signup_and_login(routes: &BoxedFilter<(Response,)>) -> String {
        let resp = warp::test::request()
            .method("POST")
            .path("/user/signup")
            .header("content-type", FORM_TYPE)
            .body("username=kiwi&password=secret")
            .reply(routes)
            .await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()["location"], "/user/login");

        let resp = warp::test::request()
            .method("POST")
            .path("/user/login")
            .header("content-type", FORM_TYPE)
            .body("username=kiwi&password=secret")
            .reply(routes)
            .await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()["location"], "/fruits");

        // "sessionid=<id>", for sending back as a cookie header
        let set_cookie = resp.headers()["set-cookie"].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn fruit_routes_redirect_to_login_without_a_session() {
        let routes = create_routes().await;

        for path in ["/fruits", "/fruits/seed", "/fruits/new", "/fruits/123"] {
            let resp = warp::test::request().path(path).reply(&routes).await;

            assert_eq!(resp.status(), StatusCode::SEE_OTHER, "{path}");
            assert_eq!(resp.headers()["location"], "/user/login", "{path}");
        }
    }

    #[tokio::test]
    async fn signup_login_then_list() {
        let routes = create_routes().await;
        let cookie = signup_and_login(&routes).await;

        let resp = warp::test::request()
            .path("/fruits")
            .header("cookie", &cookie)
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body = std::str::from_utf8(resp.body()).unwrap();
        assert!(body.contains("kiwi's fruits"), "{body}");
    }

    #[tokio::test]
    async fn failed_login_is_an_opaque_400() {
        let routes = create_routes().await;

        let resp = warp::test::request()
            .method("POST")
            .path("/user/login")
            .header("content-type", FORM_TYPE)
            .body("username=ghost&password=whatever")
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(&resp.body()[..], &b"error, read logs for details"[..]);
        assert!(resp.headers().get("set-cookie").is_none());
    }

    #[tokio::test]
    async fn seed_responds_with_the_starter_records() {
        let routes = create_routes().await;
        let cookie = signup_and_login(&routes).await;

        let resp = warp::test::request()
            .path("/fruits/seed")
            .header("cookie", &cookie)
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::OK);

        let fruits: Vec<Fruit> = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(fruits.len(), 5);
        assert_eq!(fruits[0].name, "Orange");
    }

    #[tokio::test]
    async fn create_then_delete_through_the_form_tunnel() {
        let routes = create_routes().await;
        let cookie = signup_and_login(&routes).await;

        let resp = warp::test::request()
            .method("POST")
            .path("/fruits")
            .header("content-type", FORM_TYPE)
            .header("cookie", &cookie)
            .body("name=Kiwi&color=green&readyToEat=on")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);

        let resp = warp::test::request()
            .path("/fruits")
            .header("cookie", &cookie)
            .reply(&routes)
            .await;
        let body = std::str::from_utf8(resp.body()).unwrap().to_string();
        assert!(body.contains("Kiwi"), "{body}");

        // the listing links to the fruit's detail page
        let start = body.find("/fruits/").unwrap() + "/fruits/".len();
        let id: String = body[start..].chars().take_while(|c| *c != '"').collect();

        let resp = warp::test::request()
            .method("POST")
            .path(&format!("/fruits/{id}"))
            .header("content-type", FORM_TYPE)
            .header("cookie", &cookie)
            .body("_method=DELETE")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()["location"], "/fruits");

        let resp = warp::test::request()
            .path("/fruits")
            .header("cookie", &cookie)
            .reply(&routes)
            .await;
        let body = std::str::from_utf8(resp.body()).unwrap();
        assert!(!body.contains("Kiwi"), "{body}");
    }

    #[tokio::test]
    async fn missing_fruit_renders_not_found() {
        let routes = create_routes().await;
        let cookie = signup_and_login(&routes).await;

        let resp = warp::test::request()
            .path("/fruits/no-such-id")
            .header("cookie", &cookie)
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body = std::str::from_utf8(resp.body()).unwrap();
        assert!(body.contains("No such fruit"));
    }

    #[tokio::test]
    async fn logout_expires_the_cookie_and_session() {
        let routes = create_routes().await;
        let cookie = signup_and_login(&routes).await;

        let resp = warp::test::request()
            .path("/user/logout")
            .header("cookie", &cookie)
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()["location"], "/user/login");

        let set_cookie = resp.headers()["set-cookie"].to_str().unwrap();
        assert!(set_cookie.contains("Max-Age=0"), "{set_cookie}");

        // the old session no longer resolves
        let resp = warp::test::request()
            .path("/fruits")
            .header("cookie", &cookie)
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()["location"], "/user/login");
    }
}
