//! Server-rendered pages. Small enough that each page is a plain
//! function returning markup, with user-supplied text escaped.

use crate::fruit::Fruit;

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n\
         <html>\n\
         <head><meta charset=\"utf-8\"><title>{title} - fruitstand</title></head>\n\
         <body>\n\
         <h1>{title}</h1>\n\
         {body}\n\
         </body>\n\
         </html>\n",
    )
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn signup_page() -> String {
    layout(
        "Sign up",
        "<form action=\"/user/signup\" method=\"post\">\n\
         <label>Username <input type=\"text\" name=\"username\"></label>\n\
         <label>Password <input type=\"password\" name=\"password\"></label>\n\
         <input type=\"submit\" value=\"Sign up\">\n\
         </form>\n\
         <a href=\"/user/login\">Log in instead</a>",
    )
}

pub fn login_page() -> String {
    layout(
        "Log in",
        "<form action=\"/user/login\" method=\"post\">\n\
         <label>Username <input type=\"text\" name=\"username\"></label>\n\
         <label>Password <input type=\"password\" name=\"password\"></label>\n\
         <input type=\"submit\" value=\"Log in\">\n\
         </form>\n\
         <a href=\"/user/signup\">Sign up instead</a>",
    )
}

pub fn fruits_index(username: &str, fruits: &[Fruit]) -> String {
    let mut items = String::new();
    for fruit in fruits {
        items.push_str(&format!(
            "<li><a href=\"/fruits/{id}\">{name}</a> - {color} - {ready}</li>\n",
            id = escape(&fruit.id),
            name = escape(&fruit.name),
            color = escape(&fruit.color),
            ready = ready_label(fruit),
        ));
    }

    layout(
        &format!("{}'s fruits", escape(username)),
        &format!(
            "<ul>\n{items}</ul>\n\
             <a href=\"/fruits/new\">Add a fruit</a>\n\
             <a href=\"/user/logout\">Log out</a>",
        ),
    )
}

pub fn fruit_new() -> String {
    layout(
        "New fruit",
        "<form action=\"/fruits\" method=\"post\">\n\
         <label>Name <input type=\"text\" name=\"name\"></label>\n\
         <label>Color <input type=\"text\" name=\"color\"></label>\n\
         <label>Ready to eat <input type=\"checkbox\" name=\"readyToEat\"></label>\n\
         <input type=\"submit\" value=\"Create\">\n\
         </form>\n\
         <a href=\"/fruits\">Back</a>",
    )
}

pub fn fruit_edit(fruit: &Fruit) -> String {
    layout(
        &format!("Edit {}", escape(&fruit.name)),
        &format!(
            "<form action=\"/fruits/{id}\" method=\"post\">\n\
             <input type=\"hidden\" name=\"_method\" value=\"PUT\">\n\
             <label>Name <input type=\"text\" name=\"name\" value=\"{name}\"></label>\n\
             <label>Color <input type=\"text\" name=\"color\" value=\"{color}\"></label>\n\
             <label>Ready to eat <input type=\"checkbox\" name=\"readyToEat\"{checked}></label>\n\
             <input type=\"submit\" value=\"Save\">\n\
             </form>\n\
             <a href=\"/fruits\">Back</a>",
            id = escape(&fruit.id),
            name = escape(&fruit.name),
            color = escape(&fruit.color),
            checked = if fruit.ready_to_eat { " checked" } else { "" },
        ),
    )
}

pub fn fruit_show(fruit: &Fruit) -> String {
    layout(
        &escape(&fruit.name),
        &format!(
            "<p>Color: {color}</p>\n\
             <p>{ready}</p>\n\
             <a href=\"/fruits/{id}/edit\">Edit</a>\n\
             <form action=\"/fruits/{id}\" method=\"post\">\n\
             <input type=\"hidden\" name=\"_method\" value=\"DELETE\">\n\
             <input type=\"submit\" value=\"Delete\">\n\
             </form>\n\
             <a href=\"/fruits\">Back</a>",
            color = escape(&fruit.color),
            ready = ready_label(fruit),
            id = escape(&fruit.id),
        ),
    )
}

pub fn fruit_missing() -> String {
    layout(
        "Fruit not found",
        "<p>No such fruit.</p>\n\
         <a href=\"/fruits\">Back to the list</a>",
    )
}

fn ready_label(fruit: &Fruit) -> &'static str {
    if fruit.ready_to_eat {
        "ready to eat"
    } else {
        "not ready yet"
    }
}
