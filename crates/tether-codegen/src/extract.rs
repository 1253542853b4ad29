// ABOUTME: Descriptor extraction from raw definition text.
// ABOUTME: Finds service blocks, rpc declarations and stream markers; any structural anomaly aborts.

use std::collections::HashSet;

use tracing::debug;

use crate::descriptor::{MethodDescriptor, ProtoFile, ServiceDescriptor};
use crate::error::ExtractError;
use crate::scanner::{Scanner, Token, TokenKind};

const STREAM_MARKER: &str = "stream";

/// Extract every service declared in `source`, in file order.
///
/// Only `package`, `service` and `rpc` declarations are interpreted; the
/// rest of the file is skipped as long as its braces balance. Nothing is
/// returned unless the whole file extracts cleanly.
pub fn extract(source: &str) -> Result<ProtoFile, ExtractError> {
    let tokens = Scanner::new(source).tokenize()?;
    let mut file = ProtoFile::default();
    let mut seen_services = HashSet::new();
    let mut depth = 0usize;
    let mut pos = 0usize;

    while pos < tokens.len() {
        let token = &tokens[pos];
        match &token.kind {
            TokenKind::Word(w) if depth == 0 && w == "package" => {
                if let Some(name) = tokens.get(pos + 1).and_then(Token::word) {
                    file.package = Some(name.trim_start_matches('.').to_string());
                    pos += 1;
                }
            }
            TokenKind::Word(w) if depth == 0 && w == "service" => {
                let (service, end) = service_block(&tokens, pos)?;
                if !seen_services.insert(service.proto_name.clone()) {
                    return Err(ExtractError::DuplicateService {
                        line: service.line,
                        service: service.proto_name,
                    });
                }
                debug!(
                    service = %service.proto_name,
                    methods = service.methods.len(),
                    "extracted service"
                );
                file.services.push(service);
                pos = end;
            }
            TokenKind::LBrace => depth += 1,
            TokenKind::RBrace => {
                depth = depth
                    .checked_sub(1)
                    .ok_or(ExtractError::UnmatchedBrace { line: token.line })?;
            }
            _ => {}
        }
        pos += 1;
    }

    let package = file.package.clone();
    for method in file.services.iter_mut().flat_map(|s| s.methods.iter_mut()) {
        method.resolve_types(package.as_deref());
    }
    Ok(file)
}

/// Index of the brace closing the one opened at `open`.
fn matching_brace(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token.kind {
            TokenKind::LBrace => depth += 1,
            TokenKind::RBrace => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse the service whose keyword is at `keyword`; returns it with the
/// index of its closing brace.
fn service_block(
    tokens: &[Token],
    keyword: usize,
) -> Result<(ServiceDescriptor, usize), ExtractError> {
    let line = tokens[keyword].line;
    let name_token = tokens
        .get(keyword + 1)
        .ok_or(ExtractError::EmptyServiceName { line })?;
    let name = match &name_token.kind {
        TokenKind::Word(name) => name.clone(),
        _ => return Err(ExtractError::EmptyServiceName { line: name_token.line }),
    };

    let open = keyword + 2;
    match tokens.get(open) {
        Some(token) if token.kind == TokenKind::LBrace => {}
        other => {
            return Err(ExtractError::MissingServiceBrace {
                line: other.map_or(name_token.line, |t| t.line),
                service: name,
            })
        }
    }
    let close = matching_brace(tokens, open).ok_or_else(|| ExtractError::UnclosedService {
        line,
        service: name.clone(),
    })?;

    let mut service = ServiceDescriptor::new(&name);
    service.line = line;

    let body = &tokens[open + 1..close];
    let mut depth = 0usize;
    let mut pos = 0usize;
    while pos < body.len() {
        match &body[pos].kind {
            TokenKind::Word(w) if depth == 0 && w == "rpc" => {
                let (method, next) = rpc_declaration(body, pos)?;
                if service.method(&method.proto_name).is_some() {
                    return Err(ExtractError::DuplicateMethod {
                        line: method.line,
                        service: service.proto_name,
                        method: method.proto_name,
                    });
                }
                service.methods.push(method);
                pos = next;
                continue;
            }
            TokenKind::LBrace => depth += 1,
            TokenKind::RBrace => depth = depth.saturating_sub(1),
            _ => {}
        }
        pos += 1;
    }

    Ok((service, close))
}

/// Parse the rpc declaration whose keyword is at `keyword` inside a service
/// body; returns it with the index just past its response type group.
fn rpc_declaration(
    body: &[Token],
    keyword: usize,
) -> Result<(MethodDescriptor, usize), ExtractError> {
    let line = body[keyword].line;
    let name = match body.get(keyword + 1).and_then(Token::word) {
        Some(name) if name != "returns" => name.to_string(),
        _ => return Err(ExtractError::EmptyMethodName { line }),
    };

    let missing = || ExtractError::MissingTypes {
        line,
        method: name.clone(),
    };

    let (request, after_request) = type_group(body, keyword + 2).ok_or_else(missing)?;
    let (response, after_response) = type_group(body, after_request).ok_or_else(missing)?;

    let (request_streaming, input_type) = split_stream_marker(&request);
    let (response_streaming, output_type) = split_stream_marker(&response);
    let input_type = single_type(input_type, line, &name, "request")?;
    let output_type = single_type(output_type, line, &name, "response")?;

    let mut method = MethodDescriptor::new(
        &name,
        input_type,
        output_type,
        request_streaming,
        response_streaming,
    );
    method.line = line;
    Ok((method, after_response))
}

/// Collect the words of the next parenthesis group at or after `from`.
///
/// Gives up at anything that ends a declaration, so a group can never be
/// borrowed from the next rpc.
fn type_group(body: &[Token], from: usize) -> Option<(Vec<String>, usize)> {
    let mut pos = from;
    loop {
        let token = body.get(pos)?;
        match &token.kind {
            TokenKind::LParen => break,
            TokenKind::Word(w) if w == "rpc" => return None,
            TokenKind::Semi | TokenKind::LBrace | TokenKind::RBrace => return None,
            _ => pos += 1,
        }
    }

    let mut words = Vec::new();
    for (i, token) in body.iter().enumerate().skip(pos + 1) {
        match &token.kind {
            TokenKind::RParen => return Some((words, i + 1)),
            TokenKind::Word(w) => words.push(w.clone()),
            _ => return None,
        }
    }
    None
}

/// Strip a leading `stream` marker.
fn split_stream_marker(words: &[String]) -> (bool, &[String]) {
    match words.split_first() {
        Some((first, rest)) if first == STREAM_MARKER => (true, rest),
        _ => (false, words),
    }
}

fn single_type<'a>(
    words: &'a [String],
    line: usize,
    method: &str,
    which: &'static str,
) -> Result<&'a str, ExtractError> {
    match words {
        [only] if !only.trim().is_empty() => Ok(only.trim()),
        [] => Err(ExtractError::EmptyType {
            line,
            method: method.to_string(),
            which,
        }),
        _ => Err(ExtractError::MissingTypes {
            line,
            method: method.to_string(),
        }),
    }
}
