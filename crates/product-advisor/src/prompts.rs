//! Prompt Templates
//!
//! Every prompt opens with a `[task:<name>]` tag so logs and test doubles can
//! tell the model calls of a turn apart. Placeholders use `{name}`.

pub const TASK_INTENT: &str = "intent_classification";
pub const TASK_SEARCH: &str = "search_extraction";
pub const TASK_COMPARE: &str = "compare_extraction";
pub const TASK_RECOMMEND: &str = "recommend_extraction";
pub const TASK_REVIEW: &str = "review_extraction";
pub const TASK_SYNTHESIS: &str = "synthesis";

pub const INTENT_CLASSIFICATION: &str = r#"[task:intent_classification]
Bạn là bộ phân loại ý định cho trợ lý tư vấn sản phẩm công nghệ.
Chỉ trả lời đúng MỘT nhãn trong danh sách sau, không giải thích:
- greeting: chào hỏi, cảm ơn, hỏi trợ lý làm được gì
- search: tìm sản phẩm theo loại, hãng, giá
- compare: so sánh hai hoặc ba sản phẩm
- recommend: xin tư vấn, gợi ý sản phẩm theo nhu cầu
- review: hỏi đánh giá, nhận xét về một sản phẩm
- direct: câu hỏi chung không cần tra cứu sản phẩm

Lịch sử gần đây:
{history}

Câu của người dùng: {input}
Nhãn:"#;

pub const SEARCH_EXTRACTION: &str = r#"[task:search_extraction]
Trích xuất tham số tìm kiếm từ câu của người dùng. Trả về DUY NHẤT một JSON:
{"query": string, "category": "laptop"|"smartphone"|null, "brand": string|null,
 "price_min": number|null, "price_max": number|null, "top_k": number|null}
Giá tính bằng VND (20 triệu = 20000000). top_k từ 1 đến 10.

Câu: {input}
JSON:"#;

pub const COMPARE_EXTRACTION: &str = r#"[task:compare_extraction]
Trích xuất tên các sản phẩm cần so sánh. Trả về DUY NHẤT một JSON:
{"products": [string, ...], "aspects": [string, ...]}
Tối đa 3 sản phẩm. Nếu người dùng nói "chúng", "hai cái đó"... hãy dùng các
sản phẩm vừa nhắc tới: {context}

Câu: {input}
JSON:"#;

pub const RECOMMEND_EXTRACTION: &str = r#"[task:recommend_extraction]
Trích xuất nhu cầu của người dùng. Trả về DUY NHẤT một JSON:
{"usage": "gaming"|"study"|"work"|"photography"|"general",
 "category": "laptop"|"smartphone"|null, "budget_min": number|null,
 "budget_max": number|null, "brand_preference": string|null,
 "priority_features": [string], "must_have": [string], "top_k": number|null}
Giá tính bằng VND.

Câu: {input}
JSON:"#;

pub const REVIEW_EXTRACTION: &str = r#"[task:review_extraction]
Trích xuất sản phẩm người dùng muốn xem đánh giá. Trả về DUY NHẤT một JSON:
{"product": string, "sort_by": "newest"|"oldest"|"rating_high"|"rating_low"|"helpful"|null,
 "min_rating": number|null, "limit": number|null}
Sản phẩm vừa nhắc tới: {context}

Câu: {input}
JSON:"#;

pub const SYNTHESIS: &str = r#"[task:synthesis]
Bạn là trợ lý tư vấn sản phẩm công nghệ, trả lời bằng tiếng Việt, thân thiện
và ngắn gọn. Chỉ dùng thông tin trong phần dữ liệu, không bịa thêm sản phẩm
hay giá.

Ý định: {intent}

Dữ liệu từ công cụ:
{results}

Hội thoại trước:
{history}

Người dùng: {input}
Trợ lý:"#;

/// Replace `{key}` placeholders
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}

/// Task tag of a rendered prompt, if present
pub fn task_of(prompt: &str) -> Option<&str> {
    let rest = prompt.trim_start().strip_prefix("[task:")?;
    rest.split_once(']').map(|(task, _)| task)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_and_task_tag() {
        let prompt = render(SEARCH_EXTRACTION, &[("input", "tìm laptop")]);
        assert!(prompt.contains("Câu: tìm laptop"));
        assert!(!prompt.contains("{input}"));
        assert_eq!(task_of(&prompt), Some(TASK_SEARCH));
        assert_eq!(task_of("no tag"), None);
    }

    #[test]
    fn test_every_template_is_tagged() {
        for (template, task) in [
            (INTENT_CLASSIFICATION, TASK_INTENT),
            (SEARCH_EXTRACTION, TASK_SEARCH),
            (COMPARE_EXTRACTION, TASK_COMPARE),
            (RECOMMEND_EXTRACTION, TASK_RECOMMEND),
            (REVIEW_EXTRACTION, TASK_REVIEW),
            (SYNTHESIS, TASK_SYNTHESIS),
        ] {
            assert_eq!(task_of(template), Some(task));
        }
    }
}
