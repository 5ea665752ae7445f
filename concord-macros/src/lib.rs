mod utils;

use proc_macro::{TokenStream, TokenTree};

/// Awaits every future concurrently and returns their outputs as a tuple.
///
/// Runs inside the calling task: nothing is spawned, so the futures do not
/// need to be `Send` or `'static`.
#[proc_macro]
pub fn join(input: TokenStream) -> TokenStream {
    let args = utils::split_args(input);
    let count = args.len();

    if count == 0 {
        return "()".parse().unwrap();
    }

    if count == 1 {
        let expr = utils::tokens_to_string(&args[0]);
        return format!("{{ ({expr}).await }}").parse().unwrap();
    }

    let mut output = String::new();
    output.push_str("{\n");

    for (i, expr_tokens) in args.iter().enumerate() {
        let idx = i + 1;
        let expr = utils::tokens_to_string(expr_tokens);
        output.push_str(&format!(
            "let mut __f{idx} = (::std::boxed::Box::pin({expr}), ::core::option::Option::None::<_>, false);\n"
        ));
    }

    output.push_str("::std::future::poll_fn(move |cx| {\n");
    output.push_str("    use ::std::future::Future;\n");
    output.push_str("    use ::std::task::Poll;\n");

    for i in 1..=count {
        output.push_str(&format!(
            "    if !__f{i}.2 {{\n\
                    if let Poll::Ready(val) = __f{i}.0.as_mut().poll(cx) {{\n\
                        __f{i}.1 = ::core::option::Option::Some(val);\n\
                        __f{i}.2 = true;\n\
                    }}\n\
                }}\n"
        ));
    }

    let all_done = (1..=count)
        .map(|i| format!("__f{i}.2"))
        .collect::<Vec<_>>()
        .join(" && ");

    output.push_str(&format!("    if {all_done} {{\n"));
    output.push_str("        Poll::Ready((\n");

    for i in 1..=count {
        output.push_str(&format!("            __f{i}.1.take().unwrap(),\n"));
    }

    output.push_str("        ))\n");
    output.push_str("    } else {\n");
    output.push_str("        Poll::Pending\n");
    output.push_str("    }\n");
    output.push_str("}).await\n");
    output.push_str("}\n");

    match output.parse::<TokenStream>() {
        Ok(ts) => ts,
        Err(err) => utils::compile_error(&format!("join! expansion failed: {err}")),
    }
}

/// Runs an `async fn main` on a fresh `concord::Runtime`.
///
/// Accepts `worker_threads = N` and `coordinator = false`.
///
/// ```rust,ignore
/// #[concord::main(worker_threads = 4)]
/// async fn main() {
///     // ...
/// }
/// ```
#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    let options = utils::RuntimeOptions::parse(&attr.to_string());
    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    utils::strip_async(&mut tokens);

    let Some(pos) = utils::body_position(&tokens) else {
        return utils::compile_error("#[concord::main] expects a function body");
    };

    let block = match &tokens[pos] {
        TokenTree::Group(g) => g.stream().to_string(),
        _ => unreachable!(),
    };

    let new_block = format!(
        "{{
            let runtime = {};
            runtime
                .block_on(async move {{
                    {}
                }})
        }}",
        options.builder(),
        block
    );

    utils::replace_body(tokens, pos, &new_block)
}

/// Turns an `async fn` into a `#[test]` driven by its own `concord::Runtime`.
///
/// Accepts the same options as `#[concord::main]`.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let options = utils::RuntimeOptions::parse(&attr.to_string());
    let mut tokens = item.into_iter().collect::<Vec<_>>();

    utils::strip_async(&mut tokens);

    let Some(pos) = utils::body_position(&tokens) else {
        return utils::compile_error("#[concord::test] expects a function body");
    };

    let block = match &tokens[pos] {
        TokenTree::Group(g) => g.stream().to_string(),
        _ => unreachable!(),
    };

    let new_block = format!(
        "{{
        let runtime = {};
        runtime
            .block_on(async move {{ {} }});
    }}",
        options.builder(),
        block
    );

    let test_attr: TokenStream = "#[test]".parse().unwrap();
    let mut result: Vec<TokenTree> = test_attr.into_iter().collect();
    result.extend(utils::replace_body(tokens, pos, &new_block));

    result.into_iter().collect()
}
