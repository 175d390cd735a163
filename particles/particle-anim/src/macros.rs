/// Append one instruction line (`opcode dst, src...`) to a source buffer
macro_rules! emit {
    ($code:expr, $opcode:expr, $($operand:expr),+ $(,)?) => {{
        let operands: Vec<String> = vec![$($operand.to_string()),+];
        $code.push_str($opcode);
        $code.push(' ');
        $code.push_str(&operands.join(", "));
        $code.push('\n');
    }};
}
