use crate::boxes::Mp4Box;

/// Classic 16-bytes-per-row hex dump, offsets printed from `start_offset`.
pub fn hex_dump(bytes: &[u8], start_offset: u64) -> String {
    let mut out = String::new();
    for (i, chunk) in bytes.chunks(16).enumerate() {
        let offs = start_offset + (i as u64) * 16;
        let hexs: String = chunk.iter().map(|b| format!("{:02x} ", b)).collect();
        let ascii: String = chunk
            .iter()
            .map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect();
        out.push_str(&format!("{:08x}  {:<48}  |{}|\n", offs, hexs, ascii));
    }
    out
}

/// Payload range (`start..end`, absolute) of a box node, without its header.
pub fn payload_range(b: &Mp4Box) -> (u64, u64) {
    let end = b.offset().saturating_add(b.box_size());
    (b.offset().saturating_add(b.header_size()).min(end), end)
}

/// Visit `roots` and every descendant in file order, with their depth.
pub fn walk<'a>(roots: &'a [Mp4Box], depth: usize, f: &mut impl FnMut(&'a Mp4Box, usize)) {
    for b in roots {
        f(b, depth);
        walk(b.children(), depth + 1, f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_dump_rows() {
        let s = hex_dump(b"ftypisom\x00\x00\x02\x00isomiso2avc1", 0x10);
        let lines: Vec<&str> = s.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000010  66 74 79 70 "));
        assert!(lines[0].ends_with("|ftypisom....isom|"));
        assert!(lines[1].starts_with("00000020  69 73 6f 32 "));
    }
}
