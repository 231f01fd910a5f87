//! 寄存器分组：把同一连接上的点位合并成尽量少的连续读取段。

use domain::Tag;

/// 相邻点位允许的最大空洞（寄存器数）。
pub const MAX_GAP: u32 = 20;
/// 单段最大长度（寄存器数），低于协议 125 的上限。
pub const MAX_SPAN_LEN: u32 = 100;

/// 段内点位。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanTag {
    pub name: String,
    pub address: u16,
    pub register_count: u16,
}

impl SpanTag {
    fn end(&self) -> u32 {
        u32::from(self.address) + u32::from(self.register_count)
    }
}

/// 一次批量读取覆盖的连续寄存器段。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterSpan {
    pub start: u16,
    pub count: u16,
    pub tags: Vec<SpanTag>,
}

impl RegisterSpan {
    pub fn end(&self) -> u32 {
        u32::from(self.start) + u32::from(self.count)
    }

    pub fn tag_names(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.name.clone()).collect()
    }

    /// 点位在返回数据中的偏移。
    pub fn offset_of(&self, tag: &SpanTag) -> usize {
        usize::from(tag.address.saturating_sub(self.start))
    }
}

/// 对给定点位做分组；调用方负责过滤连接与启用状态。
///
/// 合并后的段长不超过 `MAX_SPAN_LEN`；重叠点位超限时另起一段，两段读取的寄存器可以重叠。
pub fn group_registers<'a, I>(tags: I) -> Vec<RegisterSpan>
where
    I: IntoIterator<Item = &'a Tag>,
{
    let mut sorted: Vec<SpanTag> = tags
        .into_iter()
        .map(|tag| SpanTag {
            name: tag.name.clone(),
            address: tag.address,
            register_count: tag.value_type.register_count(),
        })
        .collect();
    sorted.sort_by(|a, b| a.address.cmp(&b.address).then_with(|| a.name.cmp(&b.name)));

    let mut spans: Vec<RegisterSpan> = Vec::new();
    let mut current: Option<(u32, u32, Vec<SpanTag>)> = None;

    for tag in sorted {
        let tag_start = u32::from(tag.address);
        let tag_end = tag.end();
        current = match current.take() {
            None => Some((tag_start, tag_end, vec![tag])),
            Some((start, end, mut members)) => {
                let overlaps = tag_start < end;
                let gap = tag_start.saturating_sub(end);
                let merged_end = end.max(tag_end);
                if (overlaps || gap <= MAX_GAP) && merged_end - start <= MAX_SPAN_LEN {
                    members.push(tag);
                    Some((start, merged_end, members))
                } else {
                    spans.push(close_span(start, end, members));
                    Some((tag_start, tag_end, vec![tag]))
                }
            }
        };
    }
    if let Some((start, end, members)) = current {
        spans.push(close_span(start, end, members));
    }
    spans
}

fn close_span(start: u32, end: u32, tags: Vec<SpanTag>) -> RegisterSpan {
    RegisterSpan {
        start: start as u16,
        count: (end - start) as u16,
        tags,
    }
}
