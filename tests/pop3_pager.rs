//! POP3 pager against an in-process server.

mod common;

use std::time::Duration;

use common::{mailbox, numbers, start_pop3, ServerOptions, WRONG_SECRET};
use mailpage::domain::PageRequest;
use mailpage::providers::mail::{MailboxPager, Pop3Client, RetrievalError};
use pretty_assertions::assert_eq;

fn page(size: u32, number: u32) -> PageRequest {
    PageRequest::new(size, number).unwrap()
}

#[tokio::test]
async fn first_page_is_newest_first() {
    let server = start_pop3(mailbox(12), ServerOptions::default()).await;
    let client = Pop3Client::new(server.config());

    let result = client.fetch_page(&page(5, 1)).await.unwrap();

    assert_eq!(numbers(&result.messages), vec![12, 11, 10, 9, 8]);
    assert!(result.next_cursor.is_none());
    assert_eq!(server.stats.closes(), 1);
}

#[tokio::test]
async fn last_page_holds_the_remainder() {
    let server = start_pop3(mailbox(12), ServerOptions::default()).await;
    let client = Pop3Client::new(server.config());

    let result = client.fetch_page(&page(5, 3)).await.unwrap();
    assert_eq!(numbers(&result.messages), vec![2, 1]);

    let result = client.fetch_page(&page(4, 3)).await.unwrap();
    assert_eq!(numbers(&result.messages), vec![4, 3, 2, 1]);
}

#[tokio::test]
async fn page_past_the_end_is_empty() {
    let server = start_pop3(mailbox(12), ServerOptions::default()).await;
    let client = Pop3Client::new(server.config());

    let result = client.fetch_page(&page(5, 4)).await.unwrap();
    assert!(result.is_empty());
    assert_eq!(server.stats.closes(), 1);
}

#[tokio::test]
async fn empty_mailbox_returns_empty_page() {
    let server = start_pop3(Vec::new(), ServerOptions::default()).await;
    let client = Pop3Client::new(server.config());

    let result = client.fetch_page(&page(10, 1)).await.unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn pages_never_overlap() {
    let server = start_pop3(mailbox(7), ServerOptions::default()).await;
    let client = Pop3Client::new(server.config());

    let mut seen = Vec::new();
    for number in 1..=4 {
        let result = client.fetch_page(&page(3, number)).await.unwrap();
        assert!(result.len() <= 3);
        seen.extend(numbers(&result.messages));
    }
    assert_eq!(seen, vec![7, 6, 5, 4, 3, 2, 1]);
}

#[tokio::test]
async fn dot_stuffed_lines_are_restored() {
    let server = start_pop3(mailbox(1), ServerOptions::default()).await;
    let client = Pop3Client::new(server.config());

    let result = client.fetch_page(&page(1, 1)).await.unwrap();
    let body = result.messages[0].body_text.as_deref().unwrap();
    assert!(body.contains("\n.a line that starts with a dot"));
    assert!(!body.contains(".."));
}

#[tokio::test]
async fn unparsable_message_fails_the_page_and_closes() {
    let mut messages = mailbox(5);
    messages[3] = Vec::new();
    let server = start_pop3(messages, ServerOptions::default()).await;
    let client = Pop3Client::new(server.config());

    let err = client.fetch_page(&page(5, 1)).await.unwrap_err();

    assert!(matches!(err, RetrievalError::Parse(ref m) if m.contains("message 4")));
    assert_eq!(server.stats.closes(), 1);
}

#[tokio::test]
async fn rejected_login_is_a_connection_error() {
    let server = start_pop3(mailbox(3), ServerOptions::default()).await;
    let mut config = server.config();
    config.secret = WRONG_SECRET.to_string();

    let err = Pop3Client::new(config).fetch_page(&page(5, 1)).await.unwrap_err();
    assert!(matches!(err, RetrievalError::Connection(_)));
}

#[tokio::test]
async fn deadline_still_sends_quit() {
    let options = ServerOptions {
        retrieval_delay: Some(Duration::from_millis(300)),
        ..ServerOptions::default()
    };
    let server = start_pop3(mailbox(5), options).await;
    let client =
        Pop3Client::new(server.config()).with_timeout(Some(Duration::from_millis(100)));

    let err = client.fetch_page(&page(5, 1)).await.unwrap_err();

    assert!(matches!(err, RetrievalError::Timeout(_)));
    assert_eq!(server.stats.wait_for_closes(1).await, 1);
}
