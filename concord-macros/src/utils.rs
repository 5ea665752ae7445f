use proc_macro::{Delimiter, Group, TokenStream, TokenTree};

/// Splits a `TokenStream` into comma-separated arguments.
///
/// Each argument is returned as a `Vec<TokenTree>`.
/// Commas at the top level are used as separators; commas nested in
/// groups belong to their group token and are never seen here.
pub(crate) fn split_args(input: TokenStream) -> Vec<Vec<TokenTree>> {
    let mut args = Vec::new();
    let mut current = Vec::new();

    for token in input {
        match &token {
            TokenTree::Punct(p) if p.as_char() == ',' => {
                if !current.is_empty() {
                    args.push(current);
                    current = Vec::new();
                }
            }
            _ => current.push(token),
        }
    }

    if !current.is_empty() {
        args.push(current);
    }

    args
}

/// Converts a slice of tokens into a Rust source string.
///
/// Inserts spaces between consecutive identifiers to avoid accidental
/// token merging (e.g. `move || x` vs `move||x`).
pub(crate) fn tokens_to_string(tokens: &[TokenTree]) -> String {
    let mut out = String::new();
    let mut prev_was_ident = false;

    for t in tokens {
        let is_ident = matches!(t, TokenTree::Ident(_));

        if prev_was_ident && is_ident {
            out.push(' ');
        }

        out.push_str(&t.to_string());
        prev_was_ident = is_ident;
    }

    out
}

/// Options accepted by `#[concord::main]` and `#[concord::test]`.
#[derive(Default)]
pub(crate) struct RuntimeOptions {
    worker_threads: Option<usize>,
    coordinator: Option<bool>,
}

impl RuntimeOptions {
    /// Parses `key = value` pairs. Unknown keys and bad values are ignored.
    pub(crate) fn parse(attr: &str) -> Self {
        let mut options = Self::default();

        for part in attr.split(',') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };

            match key.trim() {
                "worker_threads" => options.worker_threads = value.trim().parse().ok(),
                "coordinator" => options.coordinator = value.trim().parse().ok(),
                _ => {}
            }
        }

        options
    }

    /// Source of the expression building the runtime.
    pub(crate) fn builder(&self) -> String {
        let mut builder = String::from("::concord::RuntimeBuilder::new()");

        if let Some(n) = self.worker_threads {
            builder.push_str(&format!(".worker_threads({n})"));
        }

        if let Some(enabled) = self.coordinator {
            builder.push_str(&format!(".coordinator({enabled})"));
        }

        builder.push_str(".build().expect(\"failed to build the concord runtime\")");
        builder
    }
}

/// Removes the `async` keyword from a function signature.
pub(crate) fn strip_async(tokens: &mut Vec<TokenTree>) {
    if let Some(pos) = tokens
        .iter()
        .position(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == "async"))
    {
        tokens.remove(pos);
    }
}

/// Index of the function body (the last brace group).
pub(crate) fn body_position(tokens: &[TokenTree]) -> Option<usize> {
    tokens
        .iter()
        .rposition(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Brace))
}

/// Replaces the function body at `pos` with `body`.
pub(crate) fn replace_body(mut tokens: Vec<TokenTree>, pos: usize, body: &str) -> TokenStream {
    let stream = match body.parse::<TokenStream>() {
        Ok(stream) => stream,
        Err(err) => return compile_error(&format!("failed to expand function body: {err}")),
    };

    tokens[pos] = TokenTree::Group(Group::new(Delimiter::Brace, stream));
    tokens.into_iter().collect()
}

pub(crate) fn compile_error(message: &str) -> TokenStream {
    format!("compile_error!({message:?});")
        .parse()
        .unwrap_or_default()
}
