//! Server-rendered admin pages.
//!
//! Markup follows Bootstrap 5 conventions. Every interpolated value goes
//! through [`escape`].

use std::fmt::Write;

use super::csrf;
use crate::models::StudentListing;
use crate::validation::FieldErrors;

pub const INDEX_PATH: &str = "/admin/students";
pub const CREATE_PATH: &str = "/admin/students/create";
pub const STORE_PATH: &str = "/admin/students";

/// Previously submitted values, echoed back after a failed submission.
#[derive(Debug, Clone, Default)]
pub struct OldInput {
    pub nim: String,
    pub nama: String,
    pub email: String,
    pub status_aktif: bool,
}

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

fn layout(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title} | Student Portal Admin</title>
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css" rel="stylesheet">
</head>
<body>
    <nav class="navbar navbar-dark bg-primary mb-4">
        <div class="container-lg">
            <a class="navbar-brand" href="{index}">Student Portal Admin</a>
        </div>
    </nav>
    <main>
{content}
    </main>
</body>
</html>
"#,
        title = escape(title),
        index = INDEX_PATH,
        content = content,
    )
}

pub fn students_index(students: &[StudentListing], created: Option<i64>) -> String {
    let mut content = String::new();
    content.push_str(
        r#"    <div class="container-lg mb-5">
        <div class="row align-items-center">
            <div class="col"><h3>Students</h3></div>
            <div class="col-auto">"#,
    );
    let _ = write!(
        content,
        r#"<a href="{}" class="btn btn-primary">Add Student</a>"#,
        CREATE_PATH
    );
    content.push_str("</div>\n        </div>\n");

    if let Some(nim) = created {
        let _ = write!(
            content,
            r#"        <div class="alert alert-success mt-3" role="alert">Student {} was added.</div>
"#,
            nim
        );
    }

    if students.is_empty() {
        content.push_str(r#"        <p class="text-muted mt-4">No students yet.</p>"#);
    } else {
        content.push_str(
            r#"        <table class="table table-striped mt-4">
            <thead>
                <tr><th>NIM</th><th>Name</th><th>Email</th><th>Program of Study</th><th>Active</th></tr>
            </thead>
            <tbody>
"#,
        );
        for student in students {
            let _ = write!(
                content,
                "                <tr><td>{}</td><td>{}</td><td>{}</td><td>{} ({})</td><td>{}</td></tr>\n",
                student.nim,
                escape(&student.name),
                escape(student.email.as_deref().unwrap_or("-")),
                escape(&student.program_name),
                escape(&student.program_code),
                if student.active { "Yes" } else { "No" },
            );
        }
        content.push_str("            </tbody>\n        </table>\n");
    }
    content.push_str("    </div>");

    layout("Students", &content)
}

/// One labelled input with Bootstrap validation feedback.
fn input_field(
    out: &mut String,
    name: &str,
    label: &str,
    kind: &str,
    value: &str,
    required: bool,
    errors: &FieldErrors,
    extra: &str,
) {
    let invalid = if errors.has(name) { " is-invalid" } else { "" };
    let marker = if required {
        r#"<span class="text-danger ms-1">*</span>"#
    } else {
        ""
    };
    let value_attr = if kind == "password" {
        String::new()
    } else {
        format!(r#" value="{}""#, escape(value))
    };

    let _ = write!(
        out,
        r#"                    <div class="mb-3">
                        <label for="{name}" class="form-label">{label}{marker}</label>
                        <input type="{kind}" class="form-control{invalid}" id="{name}" name="{name}"{value_attr}{extra}>
"#,
    );
    if let Some(message) = errors.first(name) {
        let _ = write!(
            out,
            "                        <div class=\"invalid-feedback\">{}</div>\n",
            escape(message)
        );
    }
    out.push_str("                    </div>\n");
}

pub fn student_create_form(old: &OldInput, errors: &FieldErrors, csrf_token: &str) -> String {
    let mut form = String::new();
    let _ = write!(
        form,
        r#"    <div class="container-lg mb-5">
        <div class="row">
            <div class="col">
                <h3>Add Student</h3>
            </div>
        </div>
        <div class="row justify-content-center mt-4">
            <div class="col-4">
                <form action="{action}" method="post" autocomplete="on">
                    <input type="hidden" name="{field}" value="{token}">
"#,
        action = STORE_PATH,
        field = csrf::FIELD_NAME,
        token = escape(csrf_token),
    );

    input_field(&mut form, "nim", "NIM", "number", &old.nim, true, errors, " autofocus");
    input_field(&mut form, "nama", "Name", "text", &old.nama, true, errors, "");
    input_field(&mut form, "email", "Email", "email", &old.email, false, errors, "");
    input_field(&mut form, "password", "Password", "password", "", false, errors, "");

    let invalid = if errors.has("status_aktif") { " is-invalid" } else { "" };
    let checked = if old.status_aktif { " checked" } else { "" };
    let _ = write!(
        form,
        r#"                    <div class="mb-4 form-check">
                        <input type="checkbox" class="form-check-input{invalid}" id="status_aktif" name="status_aktif" value="1"{checked}>
                        <label class="form-check-label" for="status_aktif">Active</label>
"#,
    );
    if let Some(message) = errors.first("status_aktif") {
        let _ = write!(
            form,
            "                        <div class=\"invalid-feedback\">{}</div>\n",
            escape(message)
        );
    }
    let _ = write!(
        form,
        r#"                    </div>
                    <div class="d-flex justify-content-between">
                        <a href="{back}" class="btn btn-secondary">Back</a>
                        <button type="submit" class="btn btn-primary">Submit</button>
                    </div>
                </form>
            </div>
        </div>
    </div>"#,
        back = INDEX_PATH,
    );

    layout("Add Student", &form)
}

pub fn page_expired() -> String {
    message_page(
        "Page Expired",
        "The form has expired or was not submitted from this site. Go back, reload the page and try again.",
    )
}

pub fn message_page(title: &str, message: &str) -> String {
    let content = format!(
        r#"    <div class="container-lg mb-5">
        <h3>{}</h3>
        <p>{}</p>
        <a href="{}" class="btn btn-secondary">Back to students</a>
    </div>"#,
        escape(title),
        escape(message),
        INDEX_PATH,
    );
    layout(title, &content)
}
