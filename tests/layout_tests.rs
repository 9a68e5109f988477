// Layout tests
// Parsing the layout text and deriving the validated build tree from it.

use std::io::Write;

use hibf::Error;
use hibf::build::BuildTree;
use hibf::layout::parser::parse_layout;
use hibf::layout::{Layout, MaxBin, UserBin};
use tempfile::NamedTempFile;

fn parse(text: &str) -> hibf::Result<Layout> {
    parse_layout(text.as_bytes())
}

fn tree(text: &str) -> hibf::Result<BuildTree> {
    BuildTree::from_layout(&parse(text)?)
}

fn assert_invalid<T: std::fmt::Debug>(result: hibf::Result<T>, needle: &str) {
    match result {
        Err(Error::InvalidLayout(msg)) => {
            assert!(msg.contains(needle), "{msg:?} does not mention {needle:?}")
        }
        other => panic!("expected InvalidLayout mentioning {needle:?}, got {other:?}"),
    }
}

const LAYOUT: &str = "\
##CONFIG
##{\"sketch_bits\": 12}
#HIGH_LEVEL_IBF max_bin_id:0
#MERGED_BIN_2 max_bin_id:1
#MERGED_BIN_2;1 max_bin_id:0
#FILES\tBIN_INDICES\tNUMBER_OF_BINS
0\t0;\t2
1\t2;0\t1;1
2\t2;1;0\t1;1;1
3\t2;1;1\t1;1;1
4\t2;2\t1;2
";

// =============================================================================
// Parsing
// =============================================================================

#[test]
fn test_parse_full_layout() {
    // LAYOUT carries a malformed path on record 0
    let text = LAYOUT.replace("0\t0;\t2", "0\t0\t2");
    let layout = parse(&text).unwrap();

    assert_eq!(layout.top_level_max_bin_id, 0);
    assert_eq!(
        layout.max_bins,
        vec![
            MaxBin {
                previous_tb_indices: vec![2],
                id: 1
            },
            MaxBin {
                previous_tb_indices: vec![2, 1],
                id: 0
            },
        ]
    );
    assert_eq!(layout.user_bins.len(), 5);
    assert_eq!(
        layout.user_bins[4],
        UserBin {
            previous_tb_indices: vec![2],
            storage_tb_id: 2,
            number_of_technical_bins: 2,
            idx: 4,
        }
    );
}

#[test]
fn test_bad_index_reports_line() {
    // "0;" leaves an empty token in the path
    assert_invalid(parse(LAYOUT), "line 7");
}

#[test]
fn test_config_lines_only_before_header() {
    let text = "##one\n##two\n#HIGH_LEVEL_IBF max_bin_id:3\n#FILES\n0\t0\t4\n";
    let layout = parse(text).unwrap();
    assert_eq!(layout.top_level_max_bin_id, 3);
    assert!(layout.max_bins.is_empty());
    assert_eq!(layout.user_bins[0].number_of_technical_bins, 4);
}

#[test]
fn test_blank_record_lines_skipped() {
    let text = "#HIGH_LEVEL_IBF max_bin_id:0\n#FILES\n0\t0\t1\n\n1\t1\t1\n\n";
    assert_eq!(parse(text).unwrap().user_bins.len(), 2);
}

#[test]
fn test_crlf_records() {
    let text = "#HIGH_LEVEL_IBF max_bin_id:0\r\n#FILES\r\n0\t0\t1\r\n";
    let layout = parse(text).unwrap();
    assert_eq!(layout.user_bins[0].number_of_technical_bins, 1);
}

#[test]
fn test_empty_layout_rejected() {
    assert_invalid(parse(""), "empty layout");
    assert_invalid(parse("##only config\n"), "empty layout");
}

#[test]
fn test_missing_sentinel_rejected() {
    assert_invalid(parse("#HIGH_LEVEL_IBF max_bin_id:0\n"), "#FILES");
}

#[test]
fn test_bad_headers_rejected() {
    assert_invalid(parse("#TOP max_bin_id:0\n#FILES\n"), "line 1");
    assert_invalid(parse("#HIGH_LEVEL_IBF max_bin:0\n#FILES\n"), "line 1");
    assert_invalid(
        parse("#HIGH_LEVEL_IBF max_bin_id:0\n#MERGED_BIN_1\n#FILES\n"),
        "line 2",
    );
    assert_invalid(
        parse("#HIGH_LEVEL_IBF max_bin_id:0\n#MERGED_BIN_x max_bin_id:0\n#FILES\n"),
        "line 2",
    );
}

#[test]
fn test_bad_records_rejected() {
    let header = "#HIGH_LEVEL_IBF max_bin_id:0\n#FILES\n";
    let cases = [
        ("0\t0\n", "3 tab-separated fields"),
        ("0\t0\t1\textra\n", "3 tab-separated fields"),
        ("x\t0\t1\n", "user bin index"),
        ("0\t1;0\t1\n", "2 bin indices but 1 bin counts"),
        ("0\t0\t0\n", "0 technical bins"),
        ("0\t1;0\t2;1\n", "expected 1"),
    ];
    for (record, needle) in cases {
        assert_invalid(parse(&format!("{header}{record}")), needle);
    }
}

#[test]
fn test_read_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"#HIGH_LEVEL_IBF max_bin_id:1\n#FILES\n0\t0\t1\n1\t1\t3\n")
        .unwrap();

    let layout = Layout::read_from(file.path()).unwrap();
    assert_eq!(layout.top_level_max_bin_id, 1);
    assert_eq!(layout.user_bins.len(), 2);
}

#[test]
fn test_read_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = Layout::read_from(&dir.path().join("nope.layout"));
    assert!(matches!(result, Err(Error::Io(_))));
}

// =============================================================================
// Tree derivation
// =============================================================================

#[test]
fn test_tree_shape() {
    let text = LAYOUT.replace("0\t0;\t2", "0\t0\t2");
    let tree = tree(&text).unwrap();
    assert_eq!(tree.len(), 3);

    let root = tree.node(tree.root());
    assert_eq!(root.parent, None);
    assert_eq!(root.technical_bin_count, 3);
    assert_eq!(root.children, vec![1]);
    assert_eq!(root.favourite_child, None);
    assert_eq!(root.remaining_records[0].user_bin, 0);

    let middle = tree.node(1);
    assert_eq!(middle.parent, Some(0));
    assert_eq!(middle.parent_bin_index, 2);
    assert_eq!(middle.technical_bin_count, 4);
    assert_eq!(middle.favourite_child, Some(2));
    assert_eq!(middle.children, vec![2]);

    let leaf = tree.node(2);
    assert_eq!(leaf.parent, Some(1));
    assert_eq!(leaf.technical_bin_count, 2);
    assert_eq!(leaf.remaining_records[0].user_bin, 2);
    assert_eq!(tree.max_split(), 2);

    for node in tree.nodes() {
        assert_eq!(node.occupied_bins(), node.technical_bin_count);
    }
}

#[test]
fn test_merged_bins_in_any_order() {
    let text = "\
#HIGH_LEVEL_IBF max_bin_id:0
#MERGED_BIN_1;0 max_bin_id:0
#MERGED_BIN_1 max_bin_id:0
#FILES
0\t0\t1
1\t1;0;0\t1;1;1
";
    let tree = tree(text).unwrap();
    assert_eq!(tree.len(), 3);
    assert_eq!(tree.node(2).parent, Some(1));
}

#[test]
fn test_orphan_merged_bin() {
    let text = "\
#HIGH_LEVEL_IBF max_bin_id:0
#MERGED_BIN_3;0 max_bin_id:0
#FILES
0\t0\t1
1\t3;0;0\t1;1;1
";
    assert_invalid(tree(text), "no parent filter");
}

#[test]
fn test_duplicate_merged_bin() {
    let text = "\
#HIGH_LEVEL_IBF max_bin_id:0
#MERGED_BIN_1 max_bin_id:0
#MERGED_BIN_1 max_bin_id:0
#FILES
0\t0\t1
1\t1;0\t1;1
";
    assert_invalid(tree(text), "listed twice");
}

#[test]
fn test_orphan_record() {
    let text = "\
#HIGH_LEVEL_IBF max_bin_id:0
#FILES
0\t0\t1
1\t4;0\t1;1
";
    assert_invalid(tree(text), "unknown merged bin");
}

#[test]
fn test_overlapping_bins() {
    let text = "\
#HIGH_LEVEL_IBF max_bin_id:0
#FILES
0\t0\t2
1\t1\t1
";
    assert_invalid(tree(text), "assigned twice");
}

#[test]
fn test_record_over_merged_bin() {
    let text = "\
#HIGH_LEVEL_IBF max_bin_id:0
#MERGED_BIN_1 max_bin_id:0
#FILES
0\t0\t2
1\t1;0\t1;1
";
    assert_invalid(tree(text), "assigned twice");
}

#[test]
fn test_gap_in_bins() {
    let text = "\
#HIGH_LEVEL_IBF max_bin_id:0
#FILES
0\t0\t1
1\t2\t1
";
    assert_invalid(tree(text), "bin 1 of node 0 is never assigned");
}

#[test]
fn test_empty_merged_bin() {
    let text = "\
#HIGH_LEVEL_IBF max_bin_id:0
#MERGED_BIN_1 max_bin_id:0
#FILES
0\t0\t1
";
    assert_invalid(tree(text), "empty");
}

#[test]
fn test_max_bin_inside_split() {
    // Bin 1 is the second bin of user bin 0, not the start of a record
    let text = "\
#HIGH_LEVEL_IBF max_bin_id:1
#FILES
0\t0\t2
1\t2\t1
";
    assert_invalid(tree(text), "max bin 1 of node 0");
}

#[test]
fn test_max_bin_out_of_range() {
    let text = "\
#HIGH_LEVEL_IBF max_bin_id:9
#FILES
0\t0\t1
";
    assert_invalid(tree(text), "max bin 9");
}

#[test]
fn test_empty_top_level() {
    assert_invalid(tree("#HIGH_LEVEL_IBF max_bin_id:0\n#FILES\n"), "empty");
}

#[test]
fn test_record_at_last_index_rejected() {
    let text = "#HIGH_LEVEL_IBF max_bin_id:0\n#FILES\n0\t0\t1\n1\t18446744073709551615\t1\n";
    assert_invalid(tree(text), "overflows");
}

#[test]
fn test_merged_bin_at_last_index_rejected() {
    let text = "\
#HIGH_LEVEL_IBF max_bin_id:0
#MERGED_BIN_18446744073709551615 max_bin_id:0
#FILES
0\t0\t1
1\t18446744073709551615;0\t1;1
";
    assert_invalid(tree(text), "overflows");
}

#[test]
fn test_far_away_bin_rejected_without_allocating() {
    // Would need a coverage table with 10^12 entries
    let text = "#HIGH_LEVEL_IBF max_bin_id:0\n#FILES\n0\t0\t1\n1\t1000000000000\t1\n";
    assert_invalid(tree(text), "bin 1 of node 0 is never assigned");
}

#[test]
fn test_build_reports_overflowing_layout() {
    let layout = parse("#HIGH_LEVEL_IBF max_bin_id:0\n#FILES\n0\t0\t1\n1\t18446744073709551615\t1\n")
        .unwrap();
    let config = hibf::Config::new(hibf::Options::default(), |_: usize, sink: &mut dyn FnMut(u64)| {
        sink(1);
        Ok(())
    })
    .unwrap();
    assert_invalid(hibf::build(&layout, &config), "overflows");
}
