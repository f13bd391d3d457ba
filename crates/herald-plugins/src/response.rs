//! Formatting of bot replies.

/// Footer used when the configuration does not provide one.
pub const DEFAULT_ABOUT: &str = "Instructions for interacting with me using comments are \
available in the plugin help. If you have questions or suggestions related to my behavior, \
please file an issue against the repository that hosts my configuration.";

/// `@to: message`, followed by a collapsed block holding `reason` and the footer.
pub fn format_response(to: &str, message: &str, reason: &str, about: &str) -> String {
    format!("@{to}: {message}\n\n<details>\n\n{reason}\n\n{about}\n</details>")
}

/// Reply to a comment, quoting it line by line and linking back to it.
pub fn format_response_raw(
    body: &str,
    body_url: &str,
    login: &str,
    reply: &str,
    about: &str,
) -> String {
    let quoted: Vec<String> = body.split('\n').map(|line| format!(">{line}")).collect();
    let reason = format!("In response to [this]({body_url}):\n\n{}\n", quoted.join("\n"));
    format_response(login, reply, &reason, about)
}
