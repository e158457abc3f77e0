//! Prompt builders for the completion service.
//!
//! Every prompt asks for a JSON reply, but callers never rely on that and
//! always run the reply through `parse`.

/// Article characters sent with the holistic prompt.
pub const HOLISTIC_TEXT_CHARS: usize = 2000;

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Whole-article analysis shared by three dimensions.
pub fn holistic(text: &str) -> String {
    format!(
        r#"请作为新闻可信度分析专家，分析以下新闻文本的可信度。

新闻文本:
{text}

请只返回一个JSON对象，不要有其他文字，格式如下:
{{
  "总体评分": 0到1之间的数字,
  "各大类评分": {{"内容真实性": 0-1, "信息准确性": 0-1, "来源可靠性": 0-1, "语言客观性": 0-1, "逻辑连贯性": 0-1, "引用质量": 0-1}},
  "细分点评分": {{"大类_细分点": 0-1}},
  "AI生成内容": {{"表达模式": 0-1, "词汇多样性": 0-1, "句子变化": 0-1, "上下文连贯性": 0-1, "人类特征": 0-1, "分析": "说明"}},
  "语言中立性": {{"情感词汇": 0-1, "情感平衡": 0-1, "极端表述": 0-1, "煽动性表达": 0-1, "主观评价": 0-1, "分析": "说明"}},
  "详细分析": "总体说明",
  "可信度判断的疑点": ["疑点1", "疑点2"]
}}
所有评分越高表示越可信（AI生成内容评分越高表示越像人类撰写）。"#,
        text = truncate(text, HOLISTIC_TEXT_CHARS)
    )
}

/// 3-5 search keywords for one citation.
pub fn keywords(citation: &str) -> String {
    format!(
        r#"请从以下引用中提取3到5个最适合用于搜索引擎验证的关键词或短语。

引用: {citation}

只返回JSON: {{"keywords": ["关键词1", "关键词2", "关键词3"]}}"#
    )
}

/// Compare a citation against collected search evidence.
pub fn citation_judgment(citation: &str, source: &str, evidence: &[String]) -> String {
    format!(
        r#"请根据搜索到的证据判断以下引用的真实性与来源权威性。

引用: {citation}
来源: {source}

搜索证据:
{evidence}

只返回JSON: {{"truthfulness": 0到1之间的数字, "authority": 0到1之间的数字, "rationale": "简要理由"}}"#,
        evidence = numbered(evidence)
    )
}

/// Verifiable factual points for cross-validation.
pub fn verification_points(text: &str, max_points: usize) -> String {
    format!(
        r#"请从以下新闻文本中提取{max_points}个需要进行事实验证的关键点。
这些关键点应该是具体的事实陈述，而非观点或修饰性内容，且便于搜索引擎查询验证。

新闻文本:
{text}

只返回JSON，格式如下:
{{"验证点": [{{"内容": "需要验证的事实陈述", "重要性": "高/中/低", "搜索关键词": "用于搜索的短句"}}]}}"#,
        text = truncate(text, HOLISTIC_TEXT_CHARS)
    )
}

/// Judge one verification point against its search snippets.
pub fn point_judgment(point: &str, snippets: &[String]) -> String {
    format!(
        r#"请根据以下搜索结果判断该陈述是否属实。

陈述: {point}

搜索结果:
{snippets}

只返回JSON: {{"评分": 0到1之间的数字, "结论": "一句话结论"}}"#,
        snippets = numbered(snippets)
    )
}

fn numbered(items: &[String]) -> String {
    if items.is_empty() {
        return "(无)".to_string();
    }
    items
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n")
}
