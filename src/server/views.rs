//! Server-rendered pages. Each function returns the page body; `layout` wraps it
//! with the session banner and the flash message.

use std::collections::BTreeSet;

use maud::{html, Markup, PreEscaped, DOCTYPE};

use crate::documents::{ALLOWED_EXTENSIONS, MAX_NAME_LEN};

/// Percent-encode a document name for use in a URL path segment.
pub fn encode_name(name: &str) -> String {
    urlencoding::encode(name).into_owned()
}

pub fn layout(title: &str, flash: Option<&str>, user: Option<&str>, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { (title) " | flatcms" }
            }
            body {
                header {
                    @if let Some(user) = user {
                        p.session {
                            "Logged in as " (user) "."
                            form.inline method="post" action="/users/logout" {
                                button type="submit" { "Sign Out" }
                            }
                        }
                    } @else {
                        p.session {
                            a href="/users/login" { "Sign In" }
                            " or "
                            a href="/users/signup" { "Sign Up" }
                        }
                    }
                }
                @if let Some(message) = flash {
                    p.message { (message) }
                }
                main { (body) }
            }
        }
    }
}

pub fn anonymous_home() -> Markup {
    html! {
        h1 { "flatcms" }
        p { "Sign in to see the document list." }
    }
}

pub fn index(names: &BTreeSet<String>) -> Markup {
    html! {
        h1 { "Documents" }
        @if names.is_empty() {
            p { "No documents yet." }
        }
        ul.documents {
            @for name in names {
                @let enc = encode_name(name);
                li {
                    a href=(enc) { (name) }
                    " "
                    a href={ (enc) "/edit" } { "edit" }
                    form.inline method="post" action={ "/" (enc) "/duplicate" } {
                        button type="submit" { "duplicate" }
                    }
                    form.inline method="post" action={ "/" (enc) "/delete" } {
                        button type="submit" { "delete" }
                    }
                }
            }
        }
        p { a href="/new" { "New File" } }
    }
}

pub fn new_document(error: Option<&str>, file_name: &str) -> Markup {
    html! {
        h1 { "New document" }
        @if let Some(error) = error {
            p.error { (error) }
        }
        form method="post" action="/new" {
            label for="file_name" {
                "Add a new document (" (ALLOWED_EXTENSIONS.join(", ")) ", at most " (MAX_NAME_LEN) " characters):"
            }
            input id="file_name" type="text" name="file_name" value=(file_name);
            button type="submit" { "Create" }
        }
    }
}

/// `content` is already rendered HTML.
pub fn document(name: &str, content: &str) -> Markup {
    html! {
        article.document data-name=(name) {
            (PreEscaped(content))
        }
        p { a href={ "/" (encode_name(name)) "/edit" } { "Edit" } " " a href="/" { "Back" } }
    }
}

pub fn edit_document(name: &str, text: &str) -> Markup {
    html! {
        h1 { "Edit content of " (name) }
        form method="post" action={ "/" (encode_name(name)) "/edit" } {
            textarea name="edited_text" rows="20" cols="80" { (text) }
            button type="submit" { "Save Changes" }
        }
    }
}

pub fn login(error: Option<&str>, username: &str) -> Markup {
    html! {
        h1 { "Sign in" }
        @if let Some(error) = error {
            p.error { (error) }
        }
        form method="post" action="/users/login" {
            label for="username" { "Username" }
            input id="username" type="text" name="username" value=(username);
            label for="password" { "Password" }
            input id="password" type="password" name="password";
            button type="submit" { "Sign In" }
        }
    }
}

pub fn signup(error: Option<&str>, username: &str) -> Markup {
    html! {
        h1 { "Sign up" }
        @if let Some(error) = error {
            p.error { (error) }
        }
        form method="post" action="/users/signup" {
            label for="username" { "Username" }
            input id="username" type="text" name="username" value=(username);
            label for="password" { "Password" }
            input id="password" type="password" name="password";
            label for="password_confirm" { "Confirm password" }
            input id="password_confirm" type="password" name="password_confirm";
            button type="submit" { "Sign Up" }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_links_documents_relatively() {
        let names: BTreeSet<String> = ["new_file.txt".to_string(), "my notes.md".to_string()].into_iter().collect();
        let out = index(&names).into_string();
        assert!(out.contains(r#"<a href="new_file.txt">"#), "{out}");
        assert!(out.contains(r#"<a href="my%20notes.md">"#), "{out}");
        assert!(out.contains(r#"action="/new_file.txt/delete""#));
        assert!(out.contains(r#"href="/new""#));
        assert!(out.contains("New File"));
    }

    #[test]
    fn layout_shows_session_banner_and_flash() {
        let out = layout("Home", Some("Welcome!"), Some("admin"), html! {}).into_string();
        assert!(out.contains("Logged in as admin"));
        assert!(out.contains("Welcome!"));

        let out = layout("Home", None, None, html! {}).into_string();
        assert!(out.contains(r#"href="/users/login""#));
        assert!(!out.contains("Logged in as"));
    }

    #[test]
    fn forms_escape_and_keep_values() {
        let out = new_document(Some("File already exists."), "name.txt").into_string();
        assert!(out.contains(r#"value="name.txt""#));
        assert!(out.contains(r#"<button type="submit""#));
        assert!(out.contains("File already exists."));

        let out = edit_document("a.txt", "<b>raw</b>").into_string();
        assert!(out.contains("<textarea"));
        assert!(out.contains("&lt;b&gt;raw&lt;/b&gt;"));
    }

    #[test]
    fn document_body_is_not_escaped_twice() {
        let out = document("about.md", "<h1>Title</h1>").into_string();
        assert!(out.contains("<h1>Title</h1>"));
    }
}
