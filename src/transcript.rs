use std::fmt::Write;

use crate::models::{
    DomainSection, Message, MessageRole, RenderedMessage, RenderedTranscript, StudentRecord,
};

const UNSAFE_FILE_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

fn domain_error_message(index: usize) -> String {
    format!("Domain {index}의 대화 기록을 불러오는 데 실패했습니다. (형식 오류)")
}

/// Folds the six domain slots into tagged per-domain outcomes. A slot that
/// fails to parse contributes an error marker instead of aborting the rest;
/// a slot that is absent or empty contributes nothing at all.
pub fn collect_sections(student: &StudentRecord) -> Vec<DomainSection> {
    let mut sections = Vec::new();
    for (position, slot) in student.domain_slots().into_iter().enumerate() {
        let index = position + 1;
        let Some(raw) = slot else { continue };
        if raw.is_empty() {
            continue;
        }
        let outcome = parse_messages(raw).map_err(|_| domain_error_message(index));
        sections.push(DomainSection { index, outcome });
    }
    sections
}

fn parse_messages(raw: &str) -> Result<Vec<RenderedMessage>, serde_json::Error> {
    let messages: Vec<Message> = serde_json::from_str(raw)?;
    Ok(messages
        .into_iter()
        .filter(|message| message.role != MessageRole::System)
        .map(|message| RenderedMessage {
            emoji: message.role.emoji(),
            role: message.role,
            timestamp: message.timestamp,
            content: message.content,
        })
        .collect())
}

pub fn format(student: &StudentRecord) -> RenderedTranscript {
    let sections = collect_sections(student);
    // a slot counts as content even when its JSON turns out to be broken
    let has_content = !sections.is_empty();

    let mut html = format!(
        "<h1>{} ({}) 학생의 학습 대화 기록</h1>",
        student.name, student.email
    );
    let mut markdown = format!(
        "# {} ({}) 학생의 학습 대화 기록\n\n",
        student.name, student.email
    );

    for section in &sections {
        let _ = write!(html, "<hr><h2>📚 Domain {}</h2>", section.index);
        let _ = write!(markdown, "---\n\n## 📚 Domain {}\n\n", section.index);

        match &section.outcome {
            Ok(messages) => {
                for message in messages {
                    append_html_message(&mut html, message);
                    append_markdown_message(&mut markdown, message);
                }
            }
            Err(reason) => {
                let _ = write!(html, "<p><b>오류:</b> {reason}</p>");
                let _ = write!(markdown, "**오류:** {reason}\n\n");
            }
        }
    }

    RenderedTranscript {
        html,
        markdown,
        has_content,
    }
}

fn append_html_message(out: &mut String, message: &RenderedMessage) {
    let background = if message.role == MessageRole::User {
        "#f1f8e9"
    } else {
        "#e1f5fe"
    };
    let stamp = match &message.timestamp {
        Some(stamp) => format!(" ({stamp})"),
        None => String::new(),
    };
    let content = message.content.replace('\n', "<br>");
    let _ = write!(
        out,
        "<div style=\"margin: 10px; padding: 10px; border-radius: 8px; background-color: {background};\">\
         <p><b>{} {}</b>{stamp}</p><div>{content}</div></div>",
        message.emoji,
        message.role.label(),
    );
}

fn append_markdown_message(out: &mut String, message: &RenderedMessage) {
    match &message.timestamp {
        Some(stamp) => {
            let _ = write!(
                out,
                "**{} {}** ({stamp})\n\n",
                message.emoji,
                message.role.label()
            );
        }
        None => {
            let _ = write!(out, "**{} {}**\n\n", message.emoji, message.role.label());
        }
    }
    let _ = write!(out, "```\n{}\n```\n\n", message.content);
}

pub fn download_file_name(student_name: &str) -> String {
    let safe: String = student_name
        .chars()
        .filter(|c| !UNSAFE_FILE_CHARS.contains(c))
        .collect();
    format!("{safe}_학습기록.md")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const CHAT: &str = r#"[
        {"role": "system", "content": "당신은 물리 튜터입니다."},
        {"role": "user", "content": "왜 멈추나요?", "timestamp": "2026-03-02 10:31"},
        {"role": "assistant", "content": "마찰력 때문입니다.\n속도가 줄어듭니다."}
    ]"#;

    fn student(domains: [Option<&str>; 6]) -> StudentRecord {
        let [d1, d2, d3, d4, d5, d6] = domains;
        StudentRecord {
            id: 1,
            name: "김민준".to_string(),
            email: "minjun@example.com".to_string(),
            submitted_at: NaiveDate::from_ymd_opt(2026, 3, 2)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap(),
            domain_1: d1.map(str::to_string),
            domain_2: d2.map(str::to_string),
            domain_3: d3.map(str::to_string),
            domain_4: d4.map(str::to_string),
            domain_5: d5.map(str::to_string),
            domain_6: d6.map(str::to_string),
        }
    }

    #[test]
    fn system_messages_are_excluded_from_both_outputs() {
        let rendered = format(&student([Some(CHAT), None, None, None, None, None]));
        assert!(!rendered.html.contains("당신은 물리 튜터입니다."));
        assert!(!rendered.markdown.contains("당신은 물리 튜터입니다."));
        assert!(rendered.html.contains("왜 멈추나요?"));
        assert!(rendered.markdown.contains("왜 멈추나요?"));
    }

    #[test]
    fn malformed_slot_is_isolated_to_one_marker() {
        let rendered = format(&student([
            Some(CHAT),
            Some("{not valid json"),
            Some(CHAT),
            None,
            None,
            None,
        ]));
        let marker = domain_error_message(2);
        assert!(rendered.html.contains(&marker));
        assert!(rendered.markdown.contains(&marker));
        assert_eq!(rendered.markdown.matches("실패했습니다").count(), 1);
        assert!(rendered.markdown.contains("## 📚 Domain 1"));
        assert!(rendered.markdown.contains("## 📚 Domain 3"));
        assert!(rendered.markdown.contains("왜 멈추나요?"));
    }

    #[test]
    fn wrong_shape_counts_as_malformed() {
        let rendered = format(&student([
            Some(r#"{"role": "user", "content": "not a list"}"#),
            None,
            None,
            None,
            None,
            None,
        ]));
        assert!(rendered.markdown.contains(&domain_error_message(1)));
        assert!(rendered.has_content);
    }

    #[test]
    fn has_content_tracks_presence_not_parse_success() {
        let broken = format(&student([Some("{broken"), None, None, None, None, None]));
        assert!(broken.has_content);

        let empty = format(&student([None, None, None, None, None, None]));
        assert!(!empty.has_content);
    }

    #[test]
    fn empty_string_slot_is_skipped_entirely() {
        let rendered = format(&student([Some(""), None, None, None, None, None]));
        assert!(!rendered.has_content);
        assert!(!rendered.markdown.contains("Domain 1"));
    }

    #[test]
    fn content_round_trips_verbatim() {
        let rendered = format(&student([Some(CHAT), None, None, None, None, None]));
        assert!(rendered
            .markdown
            .contains("```\n마찰력 때문입니다.\n속도가 줄어듭니다.\n```"));
        assert!(rendered
            .html
            .contains("마찰력 때문입니다.<br>속도가 줄어듭니다."));
    }

    #[test]
    fn timestamp_renders_only_when_present() {
        let rendered = format(&student([Some(CHAT), None, None, None, None, None]));
        assert!(rendered.markdown.contains("**🧑‍🎓 User** (2026-03-02 10:31)"));
        assert!(rendered.markdown.contains("**🤖 Assistant**\n\n"));
        assert!(!rendered.markdown.contains("**🤖 Assistant** ()"));
    }

    #[test]
    fn domains_render_in_slot_order() {
        let rendered = format(&student([Some(CHAT), None, Some(CHAT), None, None, Some(CHAT)]));
        let first = rendered.markdown.find("## 📚 Domain 1").unwrap();
        let third = rendered.markdown.find("## 📚 Domain 3").unwrap();
        let sixth = rendered.markdown.find("## 📚 Domain 6").unwrap();
        assert!(first < third && third < sixth);
    }

    #[test]
    fn headings_carry_name_and_email() {
        let rendered = format(&student([None, None, None, None, None, None]));
        assert!(rendered
            .html
            .starts_with("<h1>김민준 (minjun@example.com) 학생의 학습 대화 기록</h1>"));
        assert!(rendered
            .markdown
            .starts_with("# 김민준 (minjun@example.com) 학생의 학습 대화 기록"));
    }

    #[test]
    fn sections_expose_the_structured_view_data() {
        let sections = collect_sections(&student([Some(CHAT), None, None, None, None, None]));
        assert_eq!(sections.len(), 1);
        let messages = sections[0].outcome.as_ref().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].emoji, "🧑‍🎓");
        assert_eq!(messages[0].timestamp.as_deref(), Some("2026-03-02 10:31"));
        assert_eq!(messages[1].emoji, "🤖");
    }

    #[test]
    fn file_name_strips_unsafe_characters() {
        let name = download_file_name("A/B:C\"D");
        assert_eq!(name, "ABCD_학습기록.md");
        assert!(!name.contains(['\\', '/', '*', '?', ':', '"', '<', '>', '|']));
    }
}
