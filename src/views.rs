//! Server-rendered pages. Every interpolated value goes through `escape`.

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>body{{font-family:sans-serif;max-width:32rem;margin:3rem auto}}.error{{color:#b00020}}</style>
</head>
<body>
{body}
</body>
</html>"#,
        title = escape(title),
    )
}

fn error_banner(error: Option<&str>) -> String {
    error
        .map(|e| format!(r#"<p class="error">{}</p>"#, escape(e)))
        .unwrap_or_default()
}

pub fn landing() -> String {
    layout(
        "Welcome",
        r#"<h1>Welcome</h1>
<p><a href="/login">Log in</a> or <a href="/register">create an account</a>.</p>"#,
    )
}

pub fn login(error: Option<&str>) -> String {
    let body = format!(
        r#"<h1>Log in</h1>
{banner}
<form method="post" action="/login">
<label>Email <input type="email" name="email" required></label>
<label>Password <input type="password" name="password" required></label>
<button type="submit">Log in</button>
</form>
<p>No account? <a href="/register">Register</a></p>"#,
        banner = error_banner(error),
    );
    layout("Log in", &body)
}

pub fn register(error: Option<&str>) -> String {
    let body = format!(
        r#"<h1>Register</h1>
{banner}
<form method="post" action="/register">
<label>Username <input type="text" name="username" required></label>
<label>Email <input type="email" name="email" required></label>
<label>Password <input type="password" name="password" required></label>
<button type="submit">Register</button>
</form>
<p>Already registered? <a href="/login">Log in</a></p>"#,
        banner = error_banner(error),
    );
    layout("Register", &body)
}

pub fn dashboard(username: Option<&str>) -> String {
    let body = format!(
        r#"<h1>Dashboard</h1>
<p>Signed in as <strong>{name}</strong>.</p>
<form method="post" action="/logout"><button type="submit">Log out</button></form>"#,
        name = escape(username.unwrap_or("user")),
    );
    layout("Dashboard", &body)
}
