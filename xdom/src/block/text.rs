use super::Block;

/// Split plain text into word, space, special symbol and new line blocks.
///
/// ASCII punctuation becomes a special symbol, runs of other non-whitespace
/// characters become words, each space or tab becomes a space block.
pub fn split_text(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut word = String::new();

    for c in text.chars() {
        if is_word_char(c) {
            word.push(c);
            continue;
        }
        flush_word(&mut word, &mut blocks);
        match c {
            '\n' => blocks.push(Block::new_line()),
            '\r' => {}
            c if c.is_whitespace() => blocks.push(Block::space()),
            c => blocks.push(Block::symbol(c)),
        }
    }
    flush_word(&mut word, &mut blocks);
    blocks
}

pub(crate) fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !c.is_ascii_punctuation()
}

fn flush_word(word: &mut String, blocks: &mut Vec<Block>) {
    if !word.is_empty() {
        blocks.push(Block::word(std::mem::take(word)));
    }
}
